use crate::bsp::{APIC, IDT, KERNEL_SELECTORS, SMP, idle, park};
use kernel_interrupts::vectors;
use kernel_smp::{ApplicationCore, Domain};
use log::{debug, error};

/// Rust entry of an application core, called by the trampoline with
/// interrupts masked on the stack from its parameter block.
pub extern "C" fn ap_entry(slot: u64, domain: u64) -> ! {
    let Ok(slot) = usize::try_from(slot) else { park() };
    let domain = domain as *const Domain<'static>;
    // SAFETY: the bootstrap core wrote the address of a `'static` domain.
    let Some(domain) = (unsafe { domain.as_ref() }) else { park() };

    let entered = unsafe {
        // SAFETY: CPL 0, interrupts masked, the GDT is the bootstrap core's.
        ApplicationCore::enter(domain, &SMP, slot, |id| {
            if let Some(&(cs, ss)) = KERNEL_SELECTORS.get() {
                reload_segments(cs, ss);
            }
            if let Some(idt) = IDT.get() {
                idt.load();
            }
            match APIC.get() {
                Some(apic) => apic.enable(vectors::APIC_SPURIOUS),
                None => error!("{id} found no local APIC"),
            }
            id
        })
    };

    match entered {
        Some(id) => {
            debug!("{id} idle");
            idle()
        }
        None => park(),
    }
}

/// Switches from the trampoline's selectors to the kernel's.
unsafe fn reload_segments(cs: u16, ss: u16) {
    // SAFETY: both selectors exist in the GDT loaded by `Domain::activate`.
    unsafe {
        core::arch::asm!(
            "mov ds, {ss:x}",
            "mov es, {ss:x}",
            "mov ss, {ss:x}",
            "push {cs}",
            "lea {tmp}, [rip + 2f]",
            "push {tmp}",
            "retfq",
            "2:",
            ss = in(reg) ss,
            cs = in(reg) u64::from(cs),
            tmp = out(reg) _,
        );
    }
}
