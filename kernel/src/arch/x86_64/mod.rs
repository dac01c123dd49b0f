// =============================================================================
// CoopKernel — x86_64 Architecture HAL (Hardware Abstraction Layer)
// =============================================================================
//
// All hardware-specific code for x86_64 lives here. Porting to another
// architecture means adding a sibling `arch/<arch>/mod.rs` with the same
// public interface (`cpu::halt`/`halt_forever`, the `ContextSwitch` impl)
// and nothing above this layer changes.
//
// DESIGN RULE: unsafe asm stays concentrated here. The scheduler only ever
// calls through the safe `task::context::ContextSwitch` trait.
// =============================================================================

pub mod context;
pub mod cpu;
