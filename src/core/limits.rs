/*!
 * System Limits and Constants
 *
 * Centralized location for the kernel's fixed limits and layout constants.
 * Grouped by domain; values match the 32-bit MIPS teaching target.
 */

use super::types::{Pid, Vaddr};
use std::time::Duration;

// =============================================================================
// PROCESS LIMITS
// =============================================================================

/// Lowest pid handed out to user processes (0 and 1 are reserved)
pub const PID_MIN: Pid = 2;

/// Highest pid handed out to user processes
pub const PID_MAX: Pid = 32767;

// =============================================================================
// EXECV ARGUMENT LIMITS
// =============================================================================

/// Maximum number of argument strings accepted by `execv`
pub const ARG_MAX_COUNT: usize = 16;

/// Maximum characters per argument, terminator excluded
pub const ARG_MAX_LEN: usize = 128;

/// Scratch buffer size per argument (characters plus terminator)
pub const ARG_BUF_SIZE: usize = ARG_MAX_LEN + 1;

/// Longest program path accepted by `execv`, terminator included
pub const PATH_MAX: usize = 1024;

// =============================================================================
// ADDRESS SPACE LAYOUT
// =============================================================================

/// Page / frame size
pub const PAGE_SIZE: usize = 4096;

/// Top of the user stack; the stack grows down from here
pub const USERSTACK: Vaddr = 0x8000_0000;

/// Pages reserved for the user stack
pub const USER_STACK_PAGES: usize = 12;

/// Width of a user pointer slot on the stack
pub const USER_WORD_SIZE: usize = 4;

/// Base of the first text segment built by `Kernel::install_program`
pub const PROGRAM_TEXT_BASE: Vaddr = 0x0040_0000;

/// Distance between text bases of consecutively installed programs
pub const PROGRAM_TEXT_STRIDE: Vaddr = 0x0010_0000;

/// Default coremap size (4 MiB of simulated physical memory)
pub const DEFAULT_FRAME_COUNT: usize = 1024;

// =============================================================================
// TIMING
// =============================================================================

/// Interval between checks while `waitpid` polls a child's exit flag
pub const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);
