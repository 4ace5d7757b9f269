pub mod dec;
pub mod ledger;
pub mod params;
pub mod state;
pub mod validator;

/// Integer quantity of the base asset or of the receipt token.
pub type Amount = u128;

pub use dec::{Dec, MathError};
pub use ledger::{Address, BankLedger, Ledger, LedgerError, StakingLedger};
pub use params::Params;
pub use state::{NetAmountState, PoolState};
pub use validator::{LiquidValidator, LiquidValidatorState, ValidatorId, ValidatorStatus, WeightEntry};
