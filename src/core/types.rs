/*!
 * Core Types
 * Common types used across the kernel
 */

/// Process ID type
pub type Pid = u32;

/// User virtual address (32-bit target)
pub type Vaddr = u32;

/// Application-defined exit code passed to `_exit`
pub type ExitCode = i32;

/// Encoded wait status word written by `waitpid`
pub type WaitStatus = i32;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// Encode a normal termination with `code` into a wait status word.
///
/// Bit 0 clear marks normal termination; the low 8 bits of the exit code
/// occupy bits 8..16.
#[inline]
#[must_use]
pub const fn mkwait_exit(code: ExitCode) -> WaitStatus {
    (code & 0xff) << 8
}

/// True if the status describes a normal termination
#[inline]
#[must_use]
pub const fn wifexited(status: WaitStatus) -> bool {
    status & 0xff == 0
}

/// Exit code carried by a normal-termination status
#[inline]
#[must_use]
pub const fn wexitstatus(status: WaitStatus) -> ExitCode {
    (status >> 8) & 0xff
}

/// Round `addr` down to a multiple of `align` (power of two)
#[inline(always)]
#[must_use]
pub const fn align_down(addr: Vaddr, align: Vaddr) -> Vaddr {
    addr & !(align - 1)
}

/// Round `addr` up to a multiple of `align` (power of two)
#[inline(always)]
#[must_use]
pub const fn align_up(addr: Vaddr, align: Vaddr) -> Vaddr {
    addr.wrapping_add(align - 1) & !(align - 1)
}
