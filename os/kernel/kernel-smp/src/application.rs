use crate::domain::Domain;
use crate::state::{CoreState, SmpState};
use core::hint::spin_loop;
use kernel_sync::CoreId;
use log::{info, warn};

/// The application-core half of the bring-up handshake.
pub struct ApplicationCore;

impl ApplicationCore {
    /// Runs on a freshly started core.
    ///
    /// Activates `domain`, claims `Ready` for `slot`, joins the core counter,
    /// runs `init` with the new logical id, then waits at the barrier until
    /// the bootstrap core and every other ready core arrived.
    ///
    /// Returns `None` without touching the counter if the bootstrap core
    /// already gave up on this slot; such a core should halt.
    ///
    /// # Safety
    /// Same as [`Domain::activate`].
    pub unsafe fn enter<R>(
        domain: &'static Domain<'static>,
        smp: &SmpState,
        slot: usize,
        init: impl FnOnce(CoreId) -> R,
    ) -> Option<R> {
        // SAFETY: upheld by the caller.
        unsafe { domain.activate() };

        if let Err(state) = smp.states().advance(slot, CoreState::Started, CoreState::Ready) {
            warn!("core slot {slot} answered in state {state:?}, parking");
            return None;
        }

        let id = smp.counter().register();
        info!("{id} online (slot {slot})");
        let result = init(id);

        // The bootstrap core arms the barrier once every core is accounted for.
        let barrier = smp.barrier();
        while barrier.is_open() {
            spin_loop();
        }
        barrier.reach();
        Some(result)
    }
}
