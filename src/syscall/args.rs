/*!
 * Program Arguments
 *
 * Fixed-size staging buffers for `execv` arguments and the routine that
 * lays them out on a new user stack. The buffers belong to a single call,
 * so concurrent `execv`s never share argument state.
 */

use crate::core::errors::KernelError;
use crate::core::limits::{ARG_BUF_SIZE, ARG_MAX_COUNT, ARG_MAX_LEN, USER_WORD_SIZE};
use crate::core::types::{align_down, KernelResult, Vaddr};
use crate::vm::copyinout::{copyin_word, copyinstr, copyout_word, copyoutstr};
use crate::vm::AddrSpace;

const WORD: Vaddr = USER_WORD_SIZE as Vaddr;

/// Arguments staged in kernel memory
pub struct ArgBuffers {
    bufs: Box<[[u8; ARG_BUF_SIZE]; ARG_MAX_COUNT]>,
    lens: [usize; ARG_MAX_COUNT],
    count: usize,
}

/// Where `copy_out` placed the argument vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgvLayout {
    pub argc: usize,
    /// User address of `argv[0]`
    pub argv: Vaddr,
    /// Initial stack pointer for the program
    pub stackptr: Vaddr,
}

impl ArgBuffers {
    pub fn new() -> Self {
        Self {
            bufs: Box::new([[0; ARG_BUF_SIZE]; ARG_MAX_COUNT]),
            lens: [0; ARG_MAX_COUNT],
            count: 0,
        }
    }

    /// Copy the NULL-terminated user vector at `argv` into kernel buffers
    ///
    /// # Errors
    /// - `BadAddress` for an unreadable vector or string
    /// - `ArgListTooLong` for more than `ARG_MAX_COUNT` arguments or an
    ///   argument longer than `ARG_MAX_LEN` bytes
    pub fn copy_in(space: &AddrSpace, argv: Vaddr) -> KernelResult<Self> {
        let mut args = Self::new();
        loop {
            let slot = argv
                .checked_add((args.count * USER_WORD_SIZE) as Vaddr)
                .ok_or(KernelError::BadAddress(argv))?;
            let ptr = copyin_word(space, slot)?;
            if ptr == 0 {
                break;
            }
            if args.count == ARG_MAX_COUNT {
                return Err(KernelError::ArgListTooLong(format!(
                    "more than {} arguments",
                    ARG_MAX_COUNT
                )));
            }

            let len = copyinstr(space, ptr, &mut args.bufs[args.count]).map_err(|e| match e {
                KernelError::NameTooLong { .. } => KernelError::ArgListTooLong(format!(
                    "argument {} exceeds {} bytes",
                    args.count, ARG_MAX_LEN
                )),
                other => other,
            })?;
            args.lens[args.count] = len - 1;
            args.count += 1;
        }
        Ok(args)
    }

    /// Stage kernel-supplied arguments, as for the first program
    pub fn from_strs(strs: &[&str]) -> KernelResult<Self> {
        if strs.len() > ARG_MAX_COUNT {
            return Err(KernelError::ArgListTooLong(format!(
                "{} arguments, at most {} allowed",
                strs.len(),
                ARG_MAX_COUNT
            )));
        }

        let mut args = Self::new();
        for (i, s) in strs.iter().enumerate() {
            let bytes = s.as_bytes();
            if bytes.contains(&0) {
                return Err(KernelError::invalid_argument(format!(
                    "argument {} contains a NUL byte",
                    i
                )));
            }
            if bytes.len() > ARG_MAX_LEN {
                return Err(KernelError::ArgListTooLong(format!(
                    "argument {} exceeds {} bytes",
                    i, ARG_MAX_LEN
                )));
            }
            args.bufs[i][..bytes.len()].copy_from_slice(bytes);
            args.lens[i] = bytes.len();
        }
        args.count = strs.len();
        Ok(args)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Argument `i` without its terminator
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        (i < self.count).then(|| &self.bufs[i][..self.lens[i]])
    }

    /// Lay the arguments out below `stackptr`.
    ///
    /// Strings go highest, argument 0 nearest the vector, each starting on
    /// a word boundary. Below them sits the pointer vector `argv[0..argc]`
    /// followed by a NULL word. The returned stack pointer is the address
    /// of `argv[0]`.
    pub fn copy_out(&self, space: &mut AddrSpace, stackptr: Vaddr) -> KernelResult<ArgvLayout> {
        let overflow = || KernelError::BadAddress(stackptr);
        let mut sp = align_down(stackptr, WORD);
        let mut addrs = [0 as Vaddr; ARG_MAX_COUNT];

        for i in (0..self.count).rev() {
            let s = &self.bufs[i][..self.lens[i]];
            sp = sp
                .checked_sub(s.len() as Vaddr + 1)
                .map(|p| align_down(p, WORD))
                .ok_or_else(overflow)?;
            copyoutstr(space, s, sp)?;
            addrs[i] = sp;
        }

        for i in (0..=self.count).rev() {
            sp = sp.checked_sub(WORD).ok_or_else(overflow)?;
            let word = if i == self.count { 0 } else { addrs[i] };
            copyout_word(space, word, sp)?;
        }

        Ok(ArgvLayout {
            argc: self.count,
            argv: sp,
            stackptr: sp,
        })
    }
}

impl Default for ArgBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ArgBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries((0..self.count).map(|i| String::from_utf8_lossy(&self.bufs[i][..self.lens[i]])))
            .finish()
    }
}
