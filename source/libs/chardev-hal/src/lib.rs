#![forbid(unsafe_code)]

//! Copy capability crossing the user/kernel trust boundary.
//!
//! Device cores never touch caller memory directly; they go through a
//! [`UserCopy`] implementation that validates the foreign side and either
//! transfers every byte or fails without partial progress.

/// Failure to validate or transfer caller memory ("bad address").
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("user memory fault")]
pub struct Fault;

/// User-memory transfer primitive shared by device backends.
pub trait UserCopy {
    /// Copies `src` (device memory) into `dst` (caller memory).
    fn copy_out(&self, dst: &mut [u8], src: &[u8]) -> Result<(), Fault>;

    /// Copies `src` (caller memory) into `dst` (device memory).
    fn copy_in(&self, dst: &mut [u8], src: &[u8]) -> Result<(), Fault>;
}

/// Trusted copier for hosts where callers share the service address space.
///
/// Both sides are ordinary slices here; the only fault this implementation
/// can report is a length mismatch between them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectCopy;

impl UserCopy for DirectCopy {
    fn copy_out(&self, dst: &mut [u8], src: &[u8]) -> Result<(), Fault> {
        if dst.len() != src.len() {
            return Err(Fault);
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    fn copy_in(&self, dst: &mut [u8], src: &[u8]) -> Result<(), Fault> {
        if dst.len() != src.len() {
            return Err(Fault);
        }
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl<T: UserCopy + ?Sized> UserCopy for &T {
    fn copy_out(&self, dst: &mut [u8], src: &[u8]) -> Result<(), Fault> {
        (**self).copy_out(dst, src)
    }

    fn copy_in(&self, dst: &mut [u8], src: &[u8]) -> Result<(), Fault> {
        (**self).copy_in(dst, src)
    }
}
