//! End-to-end selection tests against an in-memory runtime.
//!
//! These tests exercise the full enumerate → rank → select pipeline and check
//! that every context and command queue handed out by the runtime is released
//! exactly once, whatever path the selection takes.

use accel_select::{
    rank_devices, select_best_device, ComputeRuntime, DeviceContextCollection, DeviceSpec,
    DeviceType, Inventory, InventoryRuntime, PlatformSpec, RuntimeOperation, SelectError,
    SelectionConfig, Status, VersionIdentifier,
};
use test_case::test_case;

fn assert_all_released(rt: &InventoryRuntime) {
    assert_eq!(rt.live_contexts(), 0, "contexts leaked");
    assert_eq!(rt.live_queues(), 0, "queues leaked");
    assert_eq!(rt.invalid_releases(), 0, "double or unknown release");
}

/// Three platforms: "1.2" with 2 devices, "2.0" with 3 devices, "0.9" with 1.
fn three_platforms() -> InventoryRuntime {
    InventoryRuntime::new(
        Inventory::new()
            .with_platform(
                PlatformSpec::new("Alpha", "OpenCL 1.2 alpha-driver")
                    .with_vendor("Alpha Corp")
                    .with_device(DeviceSpec::gpu("alpha-gpu-0", 256))
                    .with_device(DeviceSpec::gpu("alpha-gpu-1", 1024)),
            )
            .with_platform(
                PlatformSpec::new("Beta", "OpenCL 2.0 beta")
                    .with_device(DeviceSpec::cpu("beta-cpu", 4096))
                    .with_device(DeviceSpec::gpu("beta-gpu-0", 512))
                    .with_device(DeviceSpec::gpu("beta-gpu-1", 128)),
            )
            .with_platform(
                PlatformSpec::new("Legacy", "OpenCL 0.9")
                    .with_device(DeviceSpec::gpu("legacy-gpu", 1 << 20)),
            ),
    )
}

// ==================== Enumeration ====================

#[test]
fn test_enumeration_skips_old_platform() {
    let rt = three_platforms();
    let collection =
        DeviceContextCollection::enumerate(&rt, &SelectionConfig::default()).expect("enumerate");

    assert_eq!(collection.device_count(), 5);
    assert_eq!(collection.context_count(), 2);
    assert_eq!(collection.context_end_indices(), &[2, 5]);
    for device in 0..2 {
        assert_eq!(collection.context_index_for_device(device), 0);
    }
    for device in 2..5 {
        assert_eq!(collection.context_index_for_device(device), 1);
    }

    drop(collection);
    assert_all_released(&rt);
    assert_eq!(rt.released_contexts(), 2);
}

#[test]
fn test_device_type_filter_applies_to_every_platform() {
    let rt = three_platforms();
    let config = SelectionConfig::default().with_device_type(DeviceType::GPU);
    let collection = DeviceContextCollection::enumerate(&rt, &config).expect("enumerate");
    assert_eq!(collection.device_count(), 4);
    assert_eq!(collection.context_end_indices(), &[2, 4]);
}

#[test]
fn test_view_chain_over_enumerated_devices() {
    let rt = three_platforms();
    let collection =
        DeviceContextCollection::enumerate(&rt, &SelectionConfig::default()).expect("enumerate");
    let best_first = collection
        .index_view()
        .and_then(|v| v.sort_by_capability_metric())
        .and_then(|v| v.reverse())
        .expect("view");
    assert_eq!(best_first.indices(), &[2, 1, 3, 0, 4]);

    let owners: Vec<usize> = best_first
        .indices()
        .iter()
        .map(|&i| collection.context_index_for_device(i))
        .collect();
    assert_eq!(owners, [1, 0, 1, 0, 1]);
}

// ==================== Selection ====================

#[test]
fn test_select_picks_largest_metric() {
    let rt = three_platforms();
    {
        let selected = select_best_device(&rt, &SelectionConfig::default()).expect("select");
        assert_eq!(selected.capability_metric(), 4096);
        assert_eq!(selected.device_name().expect("name"), "beta-cpu");
        assert_eq!(selected.platform_name().expect("name"), "Beta");
        assert_eq!(rt.live_contexts(), 1);
        assert_eq!(rt.live_queues(), 1);
        assert_eq!(rt.released_contexts(), 1);
    }
    assert_all_released(&rt);
    assert_eq!(rt.released_queues(), 1);
    assert_eq!(rt.released_contexts(), 2);
}

#[test_case(VersionIdentifier::new(1, 0), "beta-cpu" ; "below every eligible platform")]
#[test_case(VersionIdentifier::new(1, 2), "beta-cpu" ; "exact minimum keeps platform")]
#[test_case(VersionIdentifier::new(0, 0), "legacy-gpu" ; "zero minimum keeps legacy")]
#[test_case(VersionIdentifier::new(1, 3), "beta-cpu" ; "only newer platform")]
fn test_select_respects_minimum(minimum: VersionIdentifier, expected: &str) {
    let rt = three_platforms();
    let config = SelectionConfig::with_min_version(minimum);
    let selected = select_best_device(&rt, &config).expect("select");
    assert_eq!(selected.device_name().expect("name"), expected);
}

#[test]
fn test_select_with_equal_metrics_succeeds() {
    let rt = InventoryRuntime::new(
        Inventory::new()
            .with_platform(
                PlatformSpec::new("P0", "OpenCL 3.0")
                    .with_device(DeviceSpec::gpu("d0", 512))
                    .with_device(DeviceSpec::gpu("d1", 512)),
            )
            .with_platform(PlatformSpec::new("P1", "OpenCL 3.0").with_device(DeviceSpec::gpu("d2", 512))),
    );
    let selected = select_best_device(&rt, &SelectionConfig::default()).expect("select");
    assert_eq!(selected.capability_metric(), 512);
    drop(selected);
    assert_all_released(&rt);
}

#[test]
fn test_selected_queue_belongs_to_selected_context() {
    let rt = three_platforms();
    let selected = select_best_device(&rt, &SelectionConfig::default()).expect("select");
    let members = rt.context_devices(selected.context()).expect("context is live");
    assert!(members.contains(&selected.device()));
    assert_eq!(rt.device_platform(selected.device()), Ok(selected.platform()));
}

// ==================== Enumeration failures ====================

#[test]
fn test_no_platforms() {
    let rt = InventoryRuntime::new(Inventory::new());
    let err = select_best_device(&rt, &SelectionConfig::default()).expect_err("no platforms");
    assert_eq!(err, SelectError::NoPlatforms);
    assert_eq!(err.status(), Status::NO_PLATFORMS_FOUND);
    assert_all_released(&rt);
}

#[test]
fn test_platform_without_devices() {
    let rt = InventoryRuntime::new(
        Inventory::new()
            .with_platform(PlatformSpec::new("Full", "OpenCL 2.0").with_device(DeviceSpec::gpu("g", 64)))
            .with_platform(PlatformSpec::new("Empty", "OpenCL 2.0")),
    );
    let err = select_best_device(&rt, &SelectionConfig::default()).expect_err("empty platform");
    assert_eq!(err, SelectError::NoDevicesOnPlatform { platform_index: 1 });
    assert_eq!(err.status(), Status::NO_DEVICES_FOUND_ON_PLATFORM);
    assert_eq!(rt.call_count(RuntimeOperation::CreateContext), 0);
    assert_all_released(&rt);
}

#[test]
fn test_platform_without_matching_device_type() {
    let rt = three_platforms();
    let config = SelectionConfig::default().with_device_type(DeviceType::ACCELERATOR);
    let err = select_best_device(&rt, &config).expect_err("no accelerators");
    assert_eq!(err, SelectError::NoDevices);
    assert_eq!(rt.call_count(RuntimeOperation::CreateContext), 0);
    assert_all_released(&rt);
}

#[test]
fn test_only_cpu_on_second_platform() {
    let rt = InventoryRuntime::new(
        Inventory::new()
            .with_platform(
                PlatformSpec::new("GpuOnly", "OpenCL 3.0").with_device(DeviceSpec::gpu("gpu", 256)),
            )
            .with_platform(
                PlatformSpec::new("HasCpu", "OpenCL 3.0").with_device(DeviceSpec::cpu("cpu", 4096)),
            ),
    );
    let config = SelectionConfig::default().with_device_type(DeviceType::CPU);
    {
        let selected = select_best_device(&rt, &config).expect("cpu on second platform");
        assert_eq!(selected.device_name().expect("name"), "cpu");
        assert_eq!(selected.platform_name().expect("name"), "HasCpu");
        assert_eq!(selected.capability_metric(), 4096);
        assert_eq!(rt.live_contexts(), 1);
    }
    assert_all_released(&rt);

    let ranked = rank_devices(&rt, &config).expect("rank");
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].platform_name, "HasCpu");
    assert_all_released(&rt);
}

#[test]
fn test_nothing_meets_minimum() {
    let rt = three_platforms();
    let config = SelectionConfig::with_min_version(VersionIdentifier::new(3, 0));
    let err = select_best_device(&rt, &config).expect_err("nothing eligible");
    assert_eq!(err, SelectError::NoDevices);
    assert_eq!(rt.call_count(RuntimeOperation::CreateContext), 0);
    assert_all_released(&rt);
}

// ==================== Runtime failures ====================

#[test_case(RuntimeOperation::PlatformIds, 0 ; "platform count")]
#[test_case(RuntimeOperation::PlatformIds, 1 ; "platform ids")]
#[test_case(RuntimeOperation::PlatformInfo, 0 ; "first version size")]
#[test_case(RuntimeOperation::PlatformInfo, 3 ; "second version string")]
#[test_case(RuntimeOperation::DeviceIds, 0 ; "first device count")]
#[test_case(RuntimeOperation::DeviceIds, 2 ; "first device ids")]
#[test_case(RuntimeOperation::DeviceIds, 3 ; "second device ids")]
#[test_case(RuntimeOperation::DeviceInfo, 0 ; "first metric")]
#[test_case(RuntimeOperation::DeviceInfo, 4 ; "metric during sort")]
#[test_case(RuntimeOperation::CreateContext, 0 ; "first context")]
#[test_case(RuntimeOperation::CreateContext, 1 ; "second context")]
#[test_case(RuntimeOperation::CreateCommandQueue, 0 ; "command queue")]
fn test_runtime_failure_releases_everything(operation: RuntimeOperation, successes: usize) {
    let rt = three_platforms();
    rt.fail_on_after(operation, Status::OUT_OF_RESOURCES, successes);

    let err = select_best_device(&rt, &SelectionConfig::default()).expect_err("injected failure");
    assert_eq!(
        err,
        SelectError::Runtime {
            operation,
            status: Status::OUT_OF_RESOURCES,
        }
    );
    assert_eq!(err.status(), Status::OUT_OF_RESOURCES);
    assert_all_released(&rt);
}

#[test]
fn test_runtime_error_display_names_entry_point() {
    let rt = three_platforms();
    rt.fail_on(RuntimeOperation::CreateContext, Status::OUT_OF_HOST_MEMORY);
    let err = select_best_device(&rt, &SelectionConfig::default()).expect_err("fails");
    let message = err.to_string();
    assert!(message.contains("clCreateContext"), "{message}");
    assert!(message.contains("CL_OUT_OF_HOST_MEMORY"), "{message}");
}

#[test]
fn test_selection_recovers_after_fault_cleared() {
    let rt = three_platforms();
    rt.fail_on(RuntimeOperation::CreateCommandQueue, Status::OUT_OF_RESOURCES);
    assert!(select_best_device(&rt, &SelectionConfig::default()).is_err());
    rt.clear_faults();
    let selected = select_best_device(&rt, &SelectionConfig::default()).expect("select");
    assert_eq!(selected.capability_metric(), 4096);
}

// ==================== Ranking ====================

#[test]
fn test_rank_devices_best_first() {
    let rt = three_platforms();
    let ranked = rank_devices(&rt, &SelectionConfig::default()).expect("rank");
    let metrics: Vec<usize> = ranked.iter().map(|r| r.capability_metric).collect();
    assert_eq!(metrics, [4096, 1024, 512, 256, 128]);
    assert_eq!(ranked[0].platform_name, "Beta");
    assert_eq!(ranked[1].platform_name, "Alpha");
    assert_all_released(&rt);
}

#[test]
fn test_rank_devices_json_shape() {
    let rt = three_platforms();
    let ranked = rank_devices(&rt, &SelectionConfig::default()).expect("rank");
    let json = serde_json::to_value(&ranked).expect("serialize");
    assert_eq!(json.as_array().map(Vec::len), Some(5));
    assert_eq!(json[0]["device_name"], "beta-cpu");
    assert_eq!(json[0]["context_index"], 1);
}

// ==================== Inventory files ====================

#[test]
fn test_select_from_inventory_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("inventory.json");
    std::fs::write(
        &path,
        r#"{
            "platforms": [
                { "name": "File", "version": "OpenCL 3.0 CUDA 12.2.140",
                  "devices": [
                      { "name": "small", "max_work_group_size": 256 },
                      { "name": "big", "max_work_group_size": 1024 }
                  ] }
            ]
        }"#,
    )
    .expect("write");

    let rt = InventoryRuntime::new(Inventory::load(&path).expect("load"));
    let selected = select_best_device(&rt, &SelectionConfig::default()).expect("select");
    assert_eq!(selected.device_name().expect("name"), "big");
}
