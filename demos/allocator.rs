use std::io::Read;

use libc::sbrk;
use seglloc::{Allocator, SbrkHeap};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  env_logger::init();

  // Segregated free lists bucketed by size class, best-fit placement,
  // immediate coalescing. `init()` carves out the index and the initial
  // chunk from the real process heap via `SbrkHeap`.
  let mut allocator = Allocator::new(SbrkHeap::new());

  unsafe {
    print_program_break("start");
    if !allocator.init() {
      println!("init() failed, aborting demo");
      return;
    }
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 1) Allocate space for a u32.
    // ------------------------------------------------------------------
    let first_block = allocator.allocate(4);
    println!("\n[1] Allocate 4 bytes -> {first_block:?}");
    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 2) Allocate 12 "odd-sized" bytes.
    // ------------------------------------------------------------------
    let second_block = allocator.allocate(12);
    println!("\n[2] Allocate 12 bytes -> {second_block:?}");
    std::ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 3) Allocate a u64 and confirm 16-byte payload alignment.
    // ------------------------------------------------------------------
    let third_block = allocator.allocate(8);
    println!("\n[3] Allocate 8 bytes (observe alignment) -> {third_block:?}");
    let third_ptr = third_block as *mut u64;
    third_ptr.write(0x1122334455667788);
    println!(
      "[3] Address = {:#x}, addr % 16 = {}",
      third_block as usize,
      third_block as usize % 16
    );

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 4) Free the first block, then ask for something small enough that
    //    best-fit should reuse it.
    // ------------------------------------------------------------------
    allocator.free(first_block);
    println!("\n[4] Freed first_block at {first_block:?}");
    assert!(allocator.check_invariants(line!()));

    let fourth_block = allocator.allocate(2);
    println!("[4] Allocate 2 bytes (check reuse of freed block) -> {fourth_block:?}");
    println!(
      "[4] fourth_block == first_block? {}",
      if fourth_block == first_block { "yes, reused it" } else { "no, allocated elsewhere" }
    );

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 5) Grow the managed region with a large allocation.
    // ------------------------------------------------------------------
    print_program_break("before large alloc");
    let big_block = allocator.zero_init(64 * 1024, 1);
    println!("\n[5] Allocate large 64 KiB block (zero-initialized) -> {big_block:?}");
    print_program_break("after large alloc");

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 6) Resize the 12-byte block, confirming the leading bytes survive.
    // ------------------------------------------------------------------
    let resized = allocator.resize(second_block, 256);
    println!("\n[6] Resized second_block to 256 bytes -> {resized:?}");
    let resized_bytes = std::slice::from_raw_parts(resized, 12);
    println!("[6] Leading bytes preserved: {}", resized_bytes.iter().all(|&b| b == 0xAB));

    assert!(allocator.check_invariants(line!()));
    println!("\n[7] End of demo. Process will exit and the OS will reclaim all memory.");
  }
}
