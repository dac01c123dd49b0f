// =============================================================================
// CoopKernel — Serial REPL
// =============================================================================
//
// A tiny line-oriented command shell over the serial console. Not part of
// the three core subsystems — it is their thin external interface, the
// same role `kmain()`'s read-line loop plays in the kernel this was
// grounded on: read a line into a fixed buffer, handle backspace, dispatch
// on the whole line.
//
// Commands: `ps`, `plist`, `mem`, `memdump`, `clear`, `yield`, `help`.
// =============================================================================

use khal::serial;

use crate::state;

const INPUT_CAPACITY: usize = 128;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// Runs the REPL forever. Never returns — this is the kernel's idle loop
/// once boot is finished.
pub fn run() -> ! {
    serial::puts("\r\ncoopkernel> ");
    let mut line = [0u8; INPUT_CAPACITY];
    let mut len = 0usize;

    loop {
        let byte = serial::getc();
        match byte {
            b'\r' | b'\n' => {
                serial::puts("\r\n");
                dispatch(core::str::from_utf8(&line[..len]).unwrap_or(""));
                len = 0;
                serial::puts("coopkernel> ");
            }
            BACKSPACE | DELETE => {
                if len > 0 {
                    len -= 1;
                    serial::puts("\x08 \x08");
                }
            }
            _ if len < INPUT_CAPACITY => {
                line[len] = byte;
                len += 1;
                serial::putc(byte);
            }
            _ => {
                // Input buffer full; drop the byte rather than overflow.
            }
        }
    }
}

fn dispatch(command: &str) {
    match command.trim() {
        "" => {}
        "help" => print_help(),
        "ps" => print_ps(),
        "plist" => print_plist(),
        "mem" => print_mem(),
        "memdump" => print_memdump(),
        "clear" => serial::clear(),
        "yield" => crate::task::scheduler::yield_now(),
        other => {
            serial::puts("unknown command: ");
            serial::puts(other);
            serial::puts("\r\n");
        }
    }
}

fn print_help() {
    serial::puts(
        "commands: ps plist mem memdump clear yield help\r\n",
    );
}

/// `ps`: lists scheduler tasks — mirrors the reference kernel's `sched_ps`.
fn print_ps() {
    let kernel = state::kernel().lock();
    klog::println!("tid\tstate\t\tpriority\twake_tick");
    for task in kernel.list_tasks() {
        klog::println!(
            "{}\t{:?}\t\t{}\t\t{}",
            task.tid, task.state, task.priority, task.wake_tick
        );
    }
    klog::println!("ticks: {}", kernel.ticks());
}

/// `plist`: lists processes — mirrors the reference kernel's `proc_list`.
fn print_plist() {
    let kernel = state::kernel().lock();
    klog::println!("pid\tppid\tstate\t\texit_code\tchildren\tcpu");
    for proc in kernel.list_processes() {
        klog::println!(
            "{}\t{}\t{:?}\t\t{}\t\t{}\t\t{}",
            proc.pid, proc.parent_pid, proc.state, proc.exit_code, proc.child_count, proc.cpu_ticks
        );
    }
}

fn print_mem() {
    let stats = state::kernel().lock().heap_stats();
    klog::println!(
        "total={} used={} free={} used_blocks={} free_blocks={} largest_free={}",
        stats.total_bytes,
        stats.used_bytes,
        stats.free_bytes,
        stats.used_blocks,
        stats.free_blocks,
        stats.largest_free_block
    );
}

fn print_memdump() {
    let kernel = state::kernel().lock();
    kernel.heap_dump(|block| {
        klog::println!(
            "  {:#010x} size={:<6} {}",
            block.address,
            block.size,
            if block.free { "FREE" } else { "ALLOC" }
        );
    });
}
