//! # Application core trampoline page
//!
//! A STARTUP IPI starts the target core in real mode at the beginning of a
//! page below 1 MiB. The page holds the mode-switching code followed by a
//! parameter block at [`PARAMETERS_OFFSET`]:
//!
//! ```text
//! page + 0x000  ┌──────────────────────────┐
//!               │ trampoline code          │
//!               │ (zero padded)            │
//! page + 0xFC0  ├──────────────────────────┤
//!               │ TrampolineParameters     │
//! page + 0x1000 └──────────────────────────┘
//! ```
//!
//! The bootstrap core patches the block before every STARTUP so each
//! application core picks up its own stack and slot.

use kernel_alloc::PhysMapper;
use kernel_info::memory::REAL_MODE_LIMIT;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use log::debug;

/// Byte offset of [`TrampolineParameters`] inside the trampoline page.
pub const PARAMETERS_OFFSET: usize = 0xFC0;

/// Everything the trampoline needs to reach Rust in long mode.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrampolineParameters {
    /// Page table root to load before enabling paging. Must be below 4 GiB.
    pub cr3: u64,
    pub stack_top: u64,
    /// `extern "C" fn(slot: u64, domain: u64) -> !`
    pub entry: u64,
    /// Index of the core in the boot core table.
    pub slot: u64,
    /// Address of the core's `Domain`.
    pub domain: u64,
}

const _: () = assert!(size_of::<TrampolineParameters>() == 40);
const _: () = assert!((PARAMETERS_OFFSET + size_of::<TrampolineParameters>()) as u64 <= PAGE_SIZE);
const _: () = assert!(PARAMETERS_OFFSET % 8 == 0);

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrampolineError {
    #[error("trampoline page {page} is not page-aligned")]
    Misaligned { page: PhysicalAddress },
    #[error("trampoline page {page} is not below 1 MiB")]
    NotInRealModeMemory { page: PhysicalAddress },
    #[error("trampoline code of {len} bytes exceeds {max} bytes")]
    CodeTooLarge { len: usize, max: usize },
}

/// Checks that `page` can be the target of a STARTUP IPI.
///
/// # Errors
/// [`TrampolineError::Misaligned`] or [`TrampolineError::NotInRealModeMemory`].
pub const fn validate_entry_page(page: PhysicalAddress) -> Result<(), TrampolineError> {
    if !page.is_page_aligned() {
        return Err(TrampolineError::Misaligned { page });
    }
    if page.as_u64() >= REAL_MODE_LIMIT {
        return Err(TrampolineError::NotInRealModeMemory { page });
    }
    Ok(())
}

/// The STARTUP vector for `page`, i.e. its frame number.
///
/// # Errors
/// As [`validate_entry_page`].
#[allow(clippy::cast_possible_truncation)]
pub const fn startup_vector(page: PhysicalAddress) -> Result<u8, TrampolineError> {
    match validate_entry_page(page) {
        Ok(()) => Ok(page.frame_number() as u8),
        Err(e) => Err(e),
    }
}

/// Copies `code` to `page`, zero-fills the rest and writes `params`.
///
/// # Errors
/// See [`TrampolineError`]. Nothing is written on error.
///
/// # Safety
/// `mapper` must map `page` writable and nothing else may use the page.
pub unsafe fn install_trampoline<M: PhysMapper>(
    code: &[u8],
    page: PhysicalAddress,
    params: &TrampolineParameters,
    mapper: &M,
) -> Result<(), TrampolineError> {
    validate_entry_page(page)?;
    if code.len() > PARAMETERS_OFFSET {
        return Err(TrampolineError::CodeTooLarge {
            len: code.len(),
            max: PARAMETERS_OFFSET,
        });
    }

    // SAFETY: upheld by the caller.
    let bytes = unsafe { mapper.phys_to_slice_mut::<u8>(page, PARAMETERS_OFFSET) };
    let (head, tail) = bytes.split_at_mut(code.len());
    head.copy_from_slice(code);
    tail.fill(0);

    // SAFETY: as above.
    unsafe { write_parameters(page, params, mapper) };
    debug!("trampoline installed at {page} ({} bytes of code)", code.len());
    Ok(())
}

/// Rewrites only the parameter block of an installed trampoline.
///
/// # Safety
/// As [`install_trampoline`].
pub unsafe fn write_parameters<M: PhysMapper>(
    page: PhysicalAddress,
    params: &TrampolineParameters,
    mapper: &M,
) {
    let ptr = mapper
        .phys_to_virt(page + PARAMETERS_OFFSET as u64)
        .as_mut_ptr::<TrampolineParameters>();
    // SAFETY: as above; the offset is 8-byte aligned within the page.
    unsafe { ptr.write_volatile(*params) };
}

/// Reads the parameter block back.
///
/// # Safety
/// `mapper` must map `page` readable.
#[must_use]
pub unsafe fn read_parameters<M: PhysMapper>(
    page: PhysicalAddress,
    mapper: &M,
) -> TrampolineParameters {
    let ptr = mapper
        .phys_to_virt(page + PARAMETERS_OFFSET as u64)
        .as_mut_ptr::<TrampolineParameters>();
    // SAFETY: upheld by the caller.
    unsafe { ptr.read_volatile() }
}
