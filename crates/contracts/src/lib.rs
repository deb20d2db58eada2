//! Swap contract bindings and deployment information.
//!
//! This crate provides type-safe Solidity bindings, generated with Alloy's `sol!`
//! macro, for the constant-product router used to turn native POL into wrapped
//! AR, along with the Polygon addresses involved.
//!
//! # Deployment Information
//!
//! Each contract has a deployment struct that bundles its address and chain:
//!
//! ```
//! use permakey_contracts::polygon;
//!
//! let router = polygon::QUICKSWAP_ROUTER;
//! assert_ne!(router.address, alloy_primitives::Address::ZERO);
//! assert_eq!(router.chain_id, 137);
//! ```
//!
//! # Contract Bindings
//!
//! ```
//! use alloy_primitives::{Address, U256};
//! use alloy_sol_types::SolCall;
//! use permakey_contracts::{IUniswapV2Router02, polygon};
//!
//! let call = IUniswapV2Router02::swapExactETHForTokensCall {
//!     amountOutMin: U256::ZERO,
//!     path: polygon::swap_path(),
//!     to: Address::ZERO,
//!     deadline: U256::from(1_700_000_000u64),
//! };
//! let calldata = call.abi_encode();
//! assert_eq!(&calldata[..4], &IUniswapV2Router02::swapExactETHForTokensCall::SELECTOR);
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

extern crate alloc;

use alloy_chains::NamedChain;
use alloy_primitives::{Address, address};
use alloy_sol_types::sol;

// Deployment Info Macro

/// Macro to define a contract deployment struct with address and chain.
macro_rules! define_deployment {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            /// Contract address.
            pub address: Address,
            /// EIP-155 chain id of the network it lives on.
            pub chain_id: u64,
        }

        impl $name {
            /// Creates a new deployment.
            #[must_use]
            pub const fn new(address: Address, chain: NamedChain) -> Self {
                Self { address, chain_id: chain as u64 }
            }
        }
    };
}

// Deployment Information Types

define_deployment!(
    /// ERC20 token deployment information.
    Token
);

define_deployment!(
    /// Constant-product swap router deployment information.
    Router
);

// Token Interface

sol! {
    /// Standard ERC20 token interface.
    #[derive(Debug, PartialEq, Eq)]
    interface IERC20 {
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);

        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

// Router Interface

sol! {
    /// Uniswap V2 style router (QuickSwap on Polygon).
    ///
    /// Only the native-in swap and the quote used to preview it.
    #[derive(Debug, PartialEq, Eq)]
    interface IUniswapV2Router02 {
        function WETH() external pure returns (address);
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable returns (uint256[] memory amounts);
    }
}

// Polygon PoS Deployments

/// Polygon PoS mainnet deployments.
pub mod polygon {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Seconds a swap stays valid after it is built.
    pub const SWAP_DEADLINE_SECS: u64 = 600;

    /// QuickSwap V2 router.
    pub const QUICKSWAP_ROUTER: Router = Router::new(
        address!("a5E0829CaCED8fFDD4De3c43696c57F7D7A678ff"),
        NamedChain::Polygon,
    );

    /// Native POL token contract (system contract at `0x…1010`).
    pub const NATIVE_TOKEN: Token = Token::new(
        address!("0000000000000000000000000000000000001010"),
        NamedChain::Polygon,
    );

    /// Wrapped POL, the router's `WETH()`.
    pub const WRAPPED_NATIVE_TOKEN: Token = Token::new(
        address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
        NamedChain::Polygon,
    );

    /// Wrapped AR bridged to Polygon.
    pub const WRAPPED_AR_TOKEN: Token = Token::new(
        address!("7c9f4C87d911613Fe9ca58b579f737911AAD2D43"),
        NamedChain::Polygon,
    );

    /// Route from native POL into wrapped AR.
    pub fn swap_path() -> Vec<Address> {
        vec![WRAPPED_NATIVE_TOKEN.address, WRAPPED_AR_TOKEN.address]
    }
}
