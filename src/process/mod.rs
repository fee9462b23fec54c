/*!
 * Process Management
 *
 * PCBs, the process table, and the per-thread user context that system
 * calls run against.
 */

mod context;
mod pcb;
mod table;

pub use context::{Exit, UserContext};
pub use pcb::{Proc, ProcInfo, ProcState};
pub use table::{ProcTable, TableStats};
