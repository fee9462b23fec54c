/*!
 * Program Loader
 * Executable image parsing, loading, and construction
 */

pub mod elf;
mod image;

pub use elf::{load_elf, ElfError, ProgramHeader, PF_R, PF_W, PF_X};
pub use image::ElfBuilder;
