/*!
 * Virtual Memory
 * Frame accounting, address spaces, and user/kernel copy primitives
 */

mod addrspace;
pub mod copyinout;
mod coremap;

pub use addrspace::{AddrSpace, RegionPerms};
pub use coremap::Coremap;
