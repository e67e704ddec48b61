//! Contract Bindings
//!
//! ABI definitions for the sale distributor and the ERC-20 balance query.

use alloy_sol_types::sol;

sol! {
    /// Sale distributor accepting plain value transfers
    interface ISaleDistributor {
        function exchangeRate() external view returns (uint256);
        function minBnbAmount() external view returns (uint256);
        function maxBnbAmount() external view returns (uint256);
        function startTimestamp() external view returns (uint256);
        function endTimestamp() external view returns (uint256);
        function maxBnbCap() external view returns (uint256);
        function totalBnbReceived() external view returns (uint256);
    }

    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }
}
