// =============================================================================
// CoopKernel — Memory Subsystem
// =============================================================================
//
// The memory subsystem is exactly one thing: the heap allocator that backs
// process stacks and the REPL's `mem`/`memdump` commands. There is no
// virtual memory, paging or physical frame allocator in this kernel.
// =============================================================================

pub mod heap;
