// Order lifecycle, session driver and indicator alerts
pub mod driver;
pub mod lifecycle;
pub mod rsi_watch;
pub mod supervisor;

pub use driver::{report_balances, run_session, RunOutcome, SessionReport};
pub use lifecycle::{buy_price, sell_price, should_reprice, OrderLifecycle};
pub use rsi_watch::{check_pair, watch_rsi, RsiAlert};
pub use supervisor::{supervise, Termination};
