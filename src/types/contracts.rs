//! On-chain contract bindings.

use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

sol! {
    /// Deterministic smart account factory. `getAddress` is a read-only
    /// counterfactual derivation; the relay always uses salt 0.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IAccountFactory {
        function getAddress(address owner, uint256 salt) external view returns (address);
    }
}

sol! {
    /// The sponsoring paymaster's fee-quote surface.
    #[sol(rpc)]
    #[derive(Debug)]
    interface ISponsorPaymaster {
        /// Quotes the sponsor fee for `payer` at `timestamp`.
        ///
        /// `mode` is reserved and always 0 today. The final fee equals
        /// `baselineUsd6` plus `surchargeUsd6` when `surchargeApplies`.
        function quoteFee(address payer, uint8 mode, uint8 speed, uint256 timestamp)
            external
            view
            returns (
                uint256 baselineUsd6,
                uint256 surchargeUsd6,
                uint256 finalFeeUsd6,
                uint256 capBps,
                uint256 maxFeeRequiredUsd6,
                bool surchargeApplies
            );

        /// USD6 per whole token, as read from the paymaster's price feed.
        function tokenPriceUsd6(address token) external view returns (uint256);
    }
}

sol! {
    /// The AckLink escrow vault.
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILinkVault {
        /// Per-sender link creation nonce; advances on every successful
        /// create.
        function nonces(address sender) external view returns (uint256);
    }
}
