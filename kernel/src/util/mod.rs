// =============================================================================
// CoopKernel — Kernel Utilities
// =============================================================================
//
// Just the panic handler. Logging lives in `klog`, not here.
// =============================================================================

pub mod panic;
