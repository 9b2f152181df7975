//! ERC20 token interface
//! Only the calls the fee simulation sends to a token
use ethers::prelude::*;

abigen!(
    IERC20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
    ]"#,
);
