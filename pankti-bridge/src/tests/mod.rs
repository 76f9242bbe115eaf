//! End-to-end runs against hand-written guests
//!
//! Each guest exports counters for its allocator and entry point so the tests
//! can check the staging protocol from the guest's side.

#[cfg(test)]
mod bridge_tests {
    use crate::{
        abi::{BridgeError, GuestLimits, StreamRouting, WASM_PAGE_SIZE},
        bridge::CallBridge,
        clock::FixedClock,
        engine::ModuleLoader,
        host::HostState,
        output::SharedOutput,
    };

    /// Bump allocator guest; `runCodeApi` counts calls then runs RUN_BODY.
    const GUEST_TEMPLATE: &str = r#"
        (module
          (import "env" "writeStdout" (func $out (param i32 i32)))
          (import "env" "writeStderr" (func $err (param i32 i32)))
          (import "env" "getTimestamp" (func $now (result i64)))

          (memory (export "memory") 1)
          (data (i32.const 16) "oops")

          (global $next (mut i32) (i32.const 1024))
          (global $allocs (export "allocs") (mut i32) (i32.const 0))
          (global $frees (export "frees") (mut i32) (i32.const 0))
          (global $runs (export "runs") (mut i32) (i32.const 0))
          (global $alloc_ptr (export "alloc_ptr") (mut i32) (i32.const 0))
          (global $alloc_len (export "alloc_len") (mut i32) (i32.const 0))
          (global $freed_ptr (export "freed_ptr") (mut i32) (i32.const 0))
          (global $freed_len (export "freed_len") (mut i32) (i32.const 0))
          (global $last_time (export "last_time") (mut i64) (i64.const 0))

          (func (export "memAlloc") (param $len i32) (result i32)
            (local $ptr i32)
            (local $end i32)
            (local $size i32)
            ALLOC_GUARD
            (local.set $ptr (global.get $next))
            (local.set $end (i32.add (local.get $ptr) (local.get $len)))
            (local.set $size (i32.mul (memory.size) (i32.const 65536)))
            (if (i32.gt_u (local.get $end) (local.get $size))
              (then
                (if (i32.eq
                      (memory.grow
                        (i32.add
                          (i32.shr_u (i32.sub (local.get $end) (local.get $size)) (i32.const 16))
                          (i32.const 1)))
                      (i32.const -1))
                  (then (return (i32.const 0))))))
            (global.set $next (local.get $end))
            (global.set $allocs (i32.add (global.get $allocs) (i32.const 1)))
            (global.set $alloc_ptr (local.get $ptr))
            (global.set $alloc_len (local.get $len))
            (local.get $ptr))

          (func (export "memFree") (param $ptr i32) (param $len i32)
            FREE_GUARD
            (global.set $frees (i32.add (global.get $frees) (i32.const 1)))
            (global.set $freed_ptr (local.get $ptr))
            (global.set $freed_len (local.get $len)))

          (func (export "runCodeApi") (param $ptr i32) (param $len i32)
            (local $i i32)
            (local $addr i32)
            (global.set $runs (i32.add (global.get $runs) (i32.const 1)))
            RUN_BODY)
        )
    "#;

    /// `show("..")`: print what sits between the quotes
    const SHOW: &str = r#"
        (call $out
          (i32.add (local.get $ptr) (i32.const 6))
          (i32.sub (local.get $len) (i32.const 8)))
    "#;

    const ECHO: &str = "(call $out (local.get $ptr) (local.get $len))";

    /// One callback per input byte
    const ECHO_BYTES: &str = r#"
        (block $done
          (loop $next
            (br_if $done (i32.ge_u (local.get $i) (local.get $len)))
            (call $out (i32.add (local.get $ptr) (local.get $i)) (i32.const 1))
            (local.set $i (i32.add (local.get $i) (i32.const 1)))
            (br $next)))
    "#;

    /// Grow by two pages, write "hi" into the new region, print it
    const GROW_THEN_WRITE: &str = r#"
        (local.set $addr
          (i32.add (i32.mul (memory.grow (i32.const 2)) (i32.const 65536)) (i32.const 100)))
        (i32.store8 (local.get $addr) (i32.const 104))
        (i32.store8 (i32.add (local.get $addr) (i32.const 1)) (i32.const 105))
        (call $out (local.get $addr) (i32.const 2))
    "#;

    const MIXED_STREAMS: &str = r#"
        (call $out (local.get $ptr) (local.get $len))
        (call $err (i32.const 16) (i32.const 4))
        (call $out (local.get $ptr) (local.get $len))
    "#;

    const OUT_OF_BOUNDS: &str = r#"
        (call $out (i32.sub (i32.mul (memory.size) (i32.const 65536)) (i32.const 1)) (i32.const 2))
    "#;

    const TRAP: &str = "(unreachable)";

    const SPIN: &str = "(loop $forever (br $forever))";

    const READ_CLOCK: &str = "(global.set $last_time (call $now))";

    const ALWAYS_NULL: &str = "(return (i32.const 0))";

    const FREE_TRAPS: &str = "(unreachable)";

    fn guest(run_body: &str) -> Vec<u8> {
        guest_with(run_body, "")
    }

    fn guest_with(run_body: &str, alloc_guard: &str) -> Vec<u8> {
        guest_guarded(run_body, alloc_guard, "")
    }

    fn guest_guarded(run_body: &str, alloc_guard: &str, free_guard: &str) -> Vec<u8> {
        let wat = GUEST_TEMPLATE
            .replace("RUN_BODY", run_body)
            .replace("ALLOC_GUARD", alloc_guard)
            .replace("FREE_GUARD", free_guard);
        wat::parse_str(wat).unwrap()
    }

    fn bridge_with(
        wasm: &[u8],
        limits: GuestLimits,
        routing: StreamRouting,
    ) -> (CallBridge, SharedOutput) {
        let loader = ModuleLoader::with_limits(limits).unwrap();
        let module = loader.compile(wasm).unwrap();
        let output = SharedOutput::new(routing);
        let host = HostState::new(output.clone()).with_clock(FixedClock(1_234));
        let instance = loader.instantiate(&module, host).unwrap();
        (CallBridge::new(instance).unwrap(), output)
    }

    fn session(wasm: &[u8]) -> (CallBridge, SharedOutput) {
        bridge_with(wasm, GuestLimits::default(), StreamRouting::Merged)
    }

    fn counter(bridge: &mut CallBridge, name: &str) -> i32 {
        bridge.guest_global(name).and_then(|v| v.i32()).unwrap()
    }

    #[test]
    fn test_show_hi_scenario() {
        let (mut bridge, output) = session(&guest(SHOW));

        bridge.run(r#"show("hi")"#).unwrap();

        assert!(output.contents().ends_with("hi"));
        assert_eq!(counter(&mut bridge, "runs"), 1);
        assert_eq!(counter(&mut bridge, "allocs"), 1);
        assert_eq!(counter(&mut bridge, "frees"), 1);
        assert_eq!(counter(&mut bridge, "alloc_len"), 10);
    }

    #[test]
    fn test_free_matches_allocation_exactly() {
        let (mut bridge, _output) = session(&guest(ECHO));

        for source in ["a", "কাজ ঘুমানো(নায়ক)", "show(nayok)\nsesh\n"] {
            bridge.run(source).unwrap();
            assert_eq!(
                counter(&mut bridge, "freed_ptr"),
                counter(&mut bridge, "alloc_ptr")
            );
            assert_eq!(counter(&mut bridge, "freed_len"), source.len() as i32);
            assert_eq!(
                counter(&mut bridge, "allocs"),
                counter(&mut bridge, "frees")
            );
        }
        assert_eq!(counter(&mut bridge, "runs"), 3);
        assert_eq!(bridge.runs(), 3);
    }

    #[test]
    fn test_source_round_trips_through_guest() {
        let (mut bridge, output) = session(&guest(ECHO));
        let source = "kaj ghumano(nayok)\nshow(nayok + \" is sleeping!\")\nsesh\n";

        bridge.run(source).unwrap();
        assert_eq!(output.contents(), source);
    }

    #[test]
    fn test_allocation_failure_short_circuits() {
        let (mut bridge, output) = session(&guest_with(ECHO, ALWAYS_NULL));

        let err = bridge.run("show(1)").unwrap_err();

        assert!(matches!(err, BridgeError::OutOfMemory { len: 7 }));
        assert!(output.contents().contains("Failed to allocate memory"));
        assert_eq!(counter(&mut bridge, "runs"), 0);
        assert_eq!(counter(&mut bridge, "frees"), 0);
        assert_eq!(bridge.runs(), 0);
    }

    #[test]
    fn test_memory_cap_surfaces_as_allocation_failure() {
        let limits = GuestLimits {
            max_memory_bytes: WASM_PAGE_SIZE,
            fuel_per_run: None,
        };
        let (mut bridge, output) = bridge_with(&guest(ECHO), limits, StreamRouting::Merged);

        let source = "x".repeat(WASM_PAGE_SIZE);
        let err = bridge.run(&source).unwrap_err();

        assert!(matches!(err, BridgeError::OutOfMemory { .. }));
        assert_eq!(output.contents(), "Failed to allocate memory\n");
        assert_eq!(counter(&mut bridge, "runs"), 0);
        assert_eq!(bridge.memory_size(), WASM_PAGE_SIZE);
    }

    #[test]
    fn test_callbacks_concatenate_in_call_order() {
        let (mut bridge, output) = session(&guest(ECHO_BYTES));

        bridge.run("ordered").unwrap();
        assert_eq!(output.contents(), "ordered");

        bridge.run("!").unwrap();
        assert_eq!(output.contents(), "ordered!");
    }

    #[test]
    fn test_write_after_guest_growth_reads_grown_region() {
        let (mut bridge, output) = session(&guest(GROW_THEN_WRITE));
        assert_eq!(bridge.memory_size(), WASM_PAGE_SIZE);

        bridge.run("grow").unwrap();

        assert_eq!(output.contents(), "hi");
        assert_eq!(bridge.memory_size(), 3 * WASM_PAGE_SIZE);
    }

    #[test]
    fn test_staging_into_memory_grown_by_allocator() {
        let (mut bridge, output) = session(&guest(ECHO));

        // Larger than the initial page, so memAlloc has to grow first
        let source: String = (0..100_000).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        bridge.run(&source).unwrap();

        assert!(bridge.memory_size() > WASM_PAGE_SIZE);
        assert_eq!(output.contents(), source);
        assert_eq!(counter(&mut bridge, "frees"), 1);
    }

    #[test]
    fn test_merged_streams_keep_order() {
        let (mut bridge, output) = session(&guest(MIXED_STREAMS));

        bridge.run("a").unwrap();
        assert_eq!(output.contents(), "aoopsa");
    }

    #[test]
    fn test_split_streams() {
        let (mut bridge, output) =
            bridge_with(&guest(MIXED_STREAMS), GuestLimits::default(), StreamRouting::Split);

        bridge.run("a").unwrap();
        assert_eq!(output.contents(), "aa");
        assert_eq!(output.stderr(), "oops");
    }

    #[test]
    fn test_out_of_bounds_callback_still_frees() {
        let (mut bridge, output) = session(&guest(OUT_OF_BOUNDS));

        let err = bridge.run("x").unwrap_err();

        assert!(matches!(
            err,
            BridgeError::OutOfBounds { len: 2, size, .. } if size == WASM_PAGE_SIZE
        ));
        assert_eq!(counter(&mut bridge, "runs"), 1);
        assert_eq!(counter(&mut bridge, "frees"), 1);
        assert!(output.contents().starts_with("error: span"));
    }

    #[test]
    fn test_trap_still_frees_and_instance_survives() {
        let (mut bridge, output) = session(&guest(TRAP));

        let err = bridge.run("boom").unwrap_err();
        assert!(matches!(err, BridgeError::GuestTrap(_)));
        assert_eq!(counter(&mut bridge, "frees"), 1);

        // The module is not torn down by a trap
        assert!(bridge.run("again").is_err());
        assert_eq!(counter(&mut bridge, "allocs"), 2);
        assert_eq!(counter(&mut bridge, "frees"), 2);
        assert!(output.contents().contains("error: guest trapped"));
    }

    #[test]
    fn test_release_failure_after_successful_run() {
        let (mut bridge, output) = session(&guest_guarded(ECHO, "", FREE_TRAPS));

        let err = bridge.run("hey").unwrap_err();

        match err {
            BridgeError::GuestTrap(message) => assert!(message.starts_with("memFree")),
            other => panic!("expected a memFree trap, got {:?}", other),
        }
        // The guest output was already written before the release failed
        assert!(output.contents().starts_with("hey"));
        assert!(output.contents().contains("error: guest trapped: memFree"));
        assert_eq!(counter(&mut bridge, "runs"), 1);
        assert_eq!(bridge.runs(), 1);
    }

    #[test]
    fn test_fuel_limit_stops_runaway_guest() {
        let limits = GuestLimits {
            fuel_per_run: Some(100_000),
            ..GuestLimits::default()
        };
        let (mut bridge, _output) = bridge_with(&guest(SPIN), limits, StreamRouting::Merged);

        let err = bridge.run("spin").unwrap_err();

        assert!(matches!(err, BridgeError::GuestTrap(_)));
        assert_eq!(counter(&mut bridge, "runs"), 1);
        assert_eq!(counter(&mut bridge, "frees"), 1);
    }

    #[test]
    fn test_timestamp_reaches_guest() {
        let (mut bridge, output) = session(&guest(READ_CLOCK));

        bridge.run("now").unwrap();

        let time = bridge.guest_global("last_time").and_then(|v| v.i64()).unwrap();
        assert_eq!(time, 1_234);
        assert_eq!(output.contents(), "");
    }

    #[test]
    fn test_empty_source_is_not_staged() {
        let (mut bridge, output) = session(&guest(ECHO));

        bridge.run("").unwrap();

        assert_eq!(counter(&mut bridge, "allocs"), 0);
        assert_eq!(counter(&mut bridge, "runs"), 0);
        assert!(output.contents().is_empty());
    }

    #[test]
    fn test_clear_output() {
        let (mut bridge, output) = session(&guest(ECHO));

        bridge.run("first").unwrap();
        bridge.clear_output();
        bridge.run("second").unwrap();

        assert_eq!(output.contents(), "second");
    }

    #[test]
    fn test_missing_entry_point() {
        let wat = r#"
            (module
              (memory (export "memory") 1)
              (func (export "memAlloc") (param i32) (result i32) (i32.const 8))
              (func (export "memFree") (param i32 i32)))
        "#;
        let loader = ModuleLoader::new().unwrap();
        let module = loader.compile(&wat::parse_str(wat).unwrap()).unwrap();
        let instance = loader
            .instantiate(&module, HostState::new(SharedOutput::default()))
            .unwrap();

        let err = CallBridge::new(instance).err().unwrap();
        assert!(matches!(
            err,
            BridgeError::MissingExport { name: "runCodeApi", .. }
        ));
    }
}
