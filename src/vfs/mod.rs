/*!
 * Virtual File System
 * Program images are opened through this layer
 */

mod memory;
mod traits;
mod types;

pub use memory::MemFs;
pub use traits::{FileSystem, Vnode};
pub use types::{VfsError, VfsResult};
