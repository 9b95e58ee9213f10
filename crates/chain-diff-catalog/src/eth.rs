// crates/chain-diff-catalog/src/eth.rs
// ============================================================================
// Module: Eth Comparisons
// Description: Ethereum-compatible read operations.
// Purpose: Compare the eth, net, and web3 method families.
// Dependencies: chain-diff-core
// ============================================================================

//! ## Overview
//! Eth reads address blocks by `0x` block number or by the checkpoint's block
//! hash, transactions by the eth hash of the first sampled message, and
//! accounts by their masked ID address. Results that legitimately vary
//! between nodes (gas price, client version) are recorded but always
//! accepted; block numbers may lag by one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chain_diff_core::Arg;
use chain_diff_core::CallDescriptor;
use chain_diff_core::ComparisonRequest;
use chain_diff_core::DispatchError;
use chain_diff_core::PassContext;
use chain_diff_core::equivalence::checks::always_accept;
use chain_diff_core::equivalence::checks::within_tolerance;

use crate::catalog::ChainComparisons;
use crate::catalog::compare_all;
use crate::catalog::masked_id_address;

// ============================================================================
// SECTION: Method Names
// ============================================================================

/// Latest block number.
const ETH_BLOCK_NUMBER: &str = "EthBlockNumber";
/// Chain identifier.
const ETH_CHAIN_ID: &str = "EthChainId";
/// Network identifier.
const NET_VERSION: &str = "NetVersion";
/// Listening flag.
const NET_LISTENING: &str = "NetListening";
/// Protocol version.
const ETH_PROTOCOL_VERSION: &str = "EthProtocolVersion";
/// Managed accounts.
const ETH_ACCOUNTS: &str = "EthAccounts";
/// Current gas price.
const ETH_GAS_PRICE: &str = "EthGasPrice";
/// Client version string.
const WEB3_CLIENT_VERSION: &str = "Web3ClientVersion";
/// Transaction count of a block.
const ETH_GET_BLOCK_TRANSACTION_COUNT_BY_NUMBER: &str = "EthGetBlockTransactionCountByNumber";
/// Block by number.
const ETH_GET_BLOCK_BY_NUMBER: &str = "EthGetBlockByNumber";
/// Account balance.
const ETH_GET_BALANCE: &str = "EthGetBalance";
/// Account nonce.
const ETH_GET_TRANSACTION_COUNT: &str = "EthGetTransactionCount";
/// Transaction by block number and index.
const ETH_GET_TRANSACTION_BY_BLOCK_NUMBER_AND_INDEX: &str =
    "EthGetTransactionByBlockNumberAndIndex";
/// Block by hash.
const ETH_GET_BLOCK_BY_HASH: &str = "EthGetBlockByHash";
/// Transaction count of a block by hash.
const ETH_GET_BLOCK_TRANSACTION_COUNT_BY_HASH: &str = "EthGetBlockTransactionCountByHash";
/// Transaction by hash.
const ETH_GET_TRANSACTION_BY_HASH: &str = "EthGetTransactionByHash";
/// Transaction receipt by hash.
const ETH_GET_TRANSACTION_RECEIPT: &str = "EthGetTransactionReceipt";
/// Transaction hash of a message.
const ETH_GET_TRANSACTION_HASH_BY_CID: &str = "EthGetTransactionHashByCid";
/// Message of a transaction hash.
const ETH_GET_MESSAGE_CID_BY_TRANSACTION_HASH: &str = "EthGetMessageCidByTransactionHash";
/// Read-only call.
const ETH_CALL: &str = "EthCall";
/// Deployed code of an account.
const ETH_GET_CODE: &str = "EthGetCode";
/// Storage slot of an account.
const ETH_GET_STORAGE_AT: &str = "EthGetStorageAt";
/// Suggested priority fee.
const ETH_MAX_PRIORITY_FEE_PER_GAS: &str = "EthMaxPriorityFeePerGas";
/// Delegated address translation.
const ETH_ADDRESS_TO_FILECOIN_ADDRESS: &str = "EthAddressToFilecoinAddress";

/// Eth form of the delegated address `t410flx24nnon3f4dexgt6dh4vtoai33caru6cphna2i`.
const DELEGATED_ETH_ADDRESS: &str = "0x5df5c6b5cdd978325cd3f0cfcacdc046f620469e";

// ============================================================================
// SECTION: Operations
// ============================================================================

impl ChainComparisons {
    /// Block numbers may differ by the configured lag.
    pub(crate) async fn compare_eth_block_number(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let request = ComparisonRequest::new(ETH_BLOCK_NUMBER, Vec::new())
            .with_check(within_tolerance(self.block_number_tolerance));
        pass.compare(request).await
    }

    /// Compares the chain identifier.
    pub(crate) async fn compare_eth_chain_id(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(ETH_CHAIN_ID, Vec::new())).await
    }

    /// Compares the network identifier.
    pub(crate) async fn compare_net_version(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(NET_VERSION, Vec::new())).await
    }

    /// Compares the listening flag.
    pub(crate) async fn compare_net_listening(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(NET_LISTENING, Vec::new())).await
    }

    /// Compares the protocol version.
    pub(crate) async fn compare_eth_protocol_version(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(ETH_PROTOCOL_VERSION, Vec::new())).await
    }

    /// Neither side manages keys, so both should report no accounts.
    pub(crate) async fn compare_eth_accounts(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(ETH_ACCOUNTS, Vec::new())).await
    }

    /// Gas prices are sampled per node; only call success is compared.
    pub(crate) async fn compare_eth_gas_price(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let request = ComparisonRequest::new(ETH_GAS_PRICE, Vec::new()).with_check(always_accept());
        pass.compare(request).await
    }

    /// Client versions differ by construction; only call success is compared.
    pub(crate) async fn compare_web3_client_version(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let request =
            ComparisonRequest::new(WEB3_CLIENT_VERSION, Vec::new()).with_check(always_accept());
        pass.compare(request).await
    }

    /// Compares the transaction count of the checkpoint block.
    pub(crate) async fn compare_eth_get_block_transaction_count_by_number(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let block = block_number(pass);
        pass.compare(ComparisonRequest::new(ETH_GET_BLOCK_TRANSACTION_COUNT_BY_NUMBER, vec![block]))
            .await
    }

    /// Compares the checkpoint block without full transactions.
    pub(crate) async fn compare_eth_get_block_by_number(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let args = vec![block_number(pass), Arg::Bool(false)];
        pass.compare(ComparisonRequest::new(ETH_GET_BLOCK_BY_NUMBER, args)).await
    }

    /// Compares the balance of the sampled ID address.
    pub(crate) async fn compare_eth_get_balance(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(address) = masked_id_address(pass.fixtures().id_address()) else {
            return Ok(());
        };
        let args = vec![Arg::Address(address), block_number(pass)];
        pass.compare(ComparisonRequest::new(ETH_GET_BALANCE, args)).await
    }

    /// Compares the nonce of the first sampled sender when it has an eth form.
    pub(crate) async fn compare_eth_get_transaction_count(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(address) = pass.fixtures().first_sender().and_then(masked_id_address) else {
            return Ok(());
        };
        let args = vec![Arg::Address(address), block_number(pass)];
        pass.compare(ComparisonRequest::new(ETH_GET_TRANSACTION_COUNT, args)).await
    }

    /// Compares the first transaction of the checkpoint block.
    pub(crate) async fn compare_eth_get_transaction_by_block_number_and_index(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let args = vec![block_number(pass), Arg::Quantity(0)];
        pass.compare(ComparisonRequest::new(ETH_GET_TRANSACTION_BY_BLOCK_NUMBER_AND_INDEX, args))
            .await
    }

    /// Compares the checkpoint block by hash, without and with full transactions.
    pub(crate) async fn compare_eth_get_block_by_hash(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(hash) = pass.fixtures().block_hash() else {
            return Ok(());
        };
        let requests = [false, true]
            .into_iter()
            .map(|full| {
                let args = vec![Arg::Hash(hash), Arg::Bool(full)];
                ComparisonRequest::new(ETH_GET_BLOCK_BY_HASH, args)
            })
            .collect();
        compare_all(pass, requests).await
    }

    /// Compares the transaction count of the checkpoint block by hash.
    pub(crate) async fn compare_eth_get_block_transaction_count_by_hash(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(hash) = pass.fixtures().block_hash() else {
            return Ok(());
        };
        let args = vec![Arg::Hash(hash)];
        pass.compare(ComparisonRequest::new(ETH_GET_BLOCK_TRANSACTION_COUNT_BY_HASH, args)).await
    }

    /// Compares the transaction of the first sampled message.
    pub(crate) async fn compare_eth_get_transaction_by_hash(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(hash) = pass.fixtures().tx_hash() else {
            return Ok(());
        };
        pass.compare(ComparisonRequest::new(ETH_GET_TRANSACTION_BY_HASH, vec![Arg::Hash(hash)]))
            .await
    }

    /// Compares the receipt of the first sampled message.
    pub(crate) async fn compare_eth_get_transaction_receipt(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(hash) = pass.fixtures().tx_hash() else {
            return Ok(());
        };
        pass.compare(ComparisonRequest::new(ETH_GET_TRANSACTION_RECEIPT, vec![Arg::Hash(hash)]))
            .await
    }

    /// Maps the first sampled message to its transaction hash.
    pub(crate) async fn compare_eth_get_transaction_hash_by_cid(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(message) = pass.fixtures().first_message() else {
            return Ok(());
        };
        let args = vec![Arg::Cid(message.cid.clone())];
        pass.compare(ComparisonRequest::new(ETH_GET_TRANSACTION_HASH_BY_CID, args)).await
    }

    /// Maps the first sampled message's transaction hash back to its message.
    pub(crate) async fn compare_eth_get_message_cid_by_transaction_hash(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(hash) = pass.fixtures().tx_hash() else {
            return Ok(());
        };
        let args = vec![Arg::Hash(hash)];
        pass.compare(ComparisonRequest::new(ETH_GET_MESSAGE_CID_BY_TRANSACTION_HASH, args)).await
    }

    /// Calls the default miner with an empty zero-value transaction.
    pub(crate) async fn compare_eth_call(&self, pass: &PassContext) -> Result<(), DispatchError> {
        let Some(miner) = masked_id_address(pass.fixtures().default_miner()) else {
            return Ok(());
        };
        let call = CallDescriptor { to: Some(miner), ..CallDescriptor::default() };
        let args = vec![Arg::Call(call), block_number(pass)];
        pass.compare(ComparisonRequest::new(ETH_CALL, args)).await
    }

    /// Compares the code deployed at the default miner.
    pub(crate) async fn compare_eth_get_code(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(miner) = masked_id_address(pass.fixtures().default_miner()) else {
            return Ok(());
        };
        let args = vec![Arg::Address(miner), block_number(pass)];
        pass.compare(ComparisonRequest::new(ETH_GET_CODE, args)).await
    }

    /// Compares storage slot zero of the default miner.
    pub(crate) async fn compare_eth_get_storage_at(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(miner) = masked_id_address(pass.fixtures().default_miner()) else {
            return Ok(());
        };
        let args = vec![Arg::Address(miner), Arg::Hash([0; 32]), block_number(pass)];
        pass.compare(ComparisonRequest::new(ETH_GET_STORAGE_AT, args)).await
    }

    /// Priority fees are sampled per node; only call success is compared.
    pub(crate) async fn compare_eth_max_priority_fee_per_gas(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let request = ComparisonRequest::new(ETH_MAX_PRIORITY_FEE_PER_GAS, Vec::new())
            .with_check(always_accept());
        pass.compare(request).await
    }

    /// Translates a fixed delegated eth address.
    pub(crate) async fn compare_eth_address_to_filecoin_address(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let args = vec![Arg::Address(DELEGATED_ETH_ADDRESS.to_string())];
        pass.compare(ComparisonRequest::new(ETH_ADDRESS_TO_FILECOIN_ADDRESS, args)).await
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the checkpoint height as an eth block number.
fn block_number(pass: &PassContext) -> Arg {
    Arg::Quantity(pass.checkpoint().height)
}
