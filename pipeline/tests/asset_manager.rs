mod common;

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use common::{DeferredProcessor, STATE_FILE, TestProject, settle};
use kiln_pipeline::{
    AssetCache, AssetManagerConfig, FileChange, Flavor, ManagerState, Progress, ScanStats,
    TransformRequest,
};
use kiln_vfs::{FileTime, poll_now};

fn names(set: &BTreeSet<String>) -> Vec<&str> {
    set.iter().map(String::as_str).collect()
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

#[test]
fn hero_model_is_processed_and_cleaned_up_after_deletion() {
    let project = TestProject::new();
    project.add_pipeline("Models/AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");

    let mut manager = project.manager();
    manager.initialize(false);
    assert_eq!(manager.state(), ManagerState::Initializing);
    assert_eq!(manager.queued_requests(), 1);
    assert_eq!(manager.last_scan().processed, 1);

    settle(&mut manager);
    let hero = manager.cache().get("Models/Hero.gltf").unwrap();
    assert_eq!(hero.outputs, ["Models/Hero.mdl"]);
    assert_eq!(names(&hero.transformers), ["ModelImporter"]);
    assert!(project.cache.contains("Models/Hero.mdl"));
    assert!(project.temp.paths().is_empty());

    project.data.remove("Models/Hero.gltf");
    manager.queue_path_update(FileChange::modified("Models/Hero.gltf"));
    manager.update();

    assert!(manager.cache().get("Models/Hero.gltf").is_none());
    assert!(!project.cache.contains("Models/Hero.mdl"));
    assert!(manager.is_settled());
}

#[test]
fn nothing_to_do_settles_immediately() {
    let project = TestProject::new();
    project.add_file("readme.txt");

    let fired = Rc::new(Cell::new(0));
    let mut manager = project.manager();
    let counter = fired.clone();
    manager.subscribe_initialized(move || counter.set(counter.get() + 1));

    manager.initialize(false);
    assert_eq!(manager.state(), ManagerState::Settled);
    assert_eq!(fired.get(), 1);
    assert!(manager.cache().get("readme.txt").unwrap().is_ignored());
    assert_eq!(
        manager.last_scan(),
        ScanStats {
            processed: 0,
            up_to_date: 0,
            ignored: 1
        }
    );
}

#[test]
fn initialized_fires_once_after_queue_drains() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("a.gltf");
    project.add_file("b.gltf");

    let fired = Rc::new(Cell::new(0));
    let mut manager = project.manager();
    let counter = fired.clone();
    manager.subscribe_initialized(move || counter.set(counter.get() + 1));

    manager.initialize(false);
    assert_eq!(fired.get(), 0);
    assert!(!manager.is_initialized());

    settle(&mut manager);
    assert_eq!(fired.get(), 1);
    assert_eq!(
        manager.progress(),
        Progress {
            completed: 2,
            total: 2
        }
    );

    manager.mark_cache_dirty("");
    settle(&mut manager);
    assert_eq!(fired.get(), 1);
}

#[test]
fn rescan_of_unchanged_tree_enqueues_nothing() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter", "TextureImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("Textures/a.png");
    project.add_file("readme.txt");

    let mut first = project.manager();
    first.initialize(false);
    settle(&mut first);
    first.save_state(STATE_FILE).unwrap();

    let mut second = project.manager();
    second.load_state(STATE_FILE);
    second.initialize(false);

    assert_eq!(second.state(), ManagerState::Settled);
    assert_eq!(second.queued_requests(), 0);
    assert_eq!(
        second.last_scan(),
        ScanStats {
            processed: 0,
            up_to_date: 2,
            ignored: 1
        }
    );
}

#[test]
fn changed_pipeline_since_last_run_invalidates_its_scope() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["TextureImporter"]);
    project.add_pipeline("Models/AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("Textures/a.png");

    let mut first = project.manager();
    first.initialize(false);
    settle(&mut first);
    first.save_state(STATE_FILE).unwrap();

    project.data.touch("Models/AssetPipeline.json");

    let mut second = project.manager();
    second.load_state(STATE_FILE);
    second.initialize(false);
    assert_eq!(second.last_scan().processed, 1);
    assert_eq!(second.last_scan().up_to_date, 1);
}

#[test]
fn stale_cache_folders_are_removed() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.cache.insert("Stale/Deep/old.bin", b"".to_vec());

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);

    assert!(!project.cache.contains("Stale/Deep/old.bin"));
    assert!(project.cache.contains("Models/Hero.mdl"));
}

#[test]
fn ignore_patterns_and_pipeline_files_are_not_assets() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["CopyTransformer"]);
    project.add_pipeline("Extra.assetpipeline", &[]);
    project.add_file("Scenes/Level.user.json");
    project.add_file("Scenes/Level.json");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);

    let cached: Vec<&str> = manager
        .cache()
        .assets()
        .map(|asset| asset.resource_name.as_str())
        .collect();
    assert_eq!(cached, ["Scenes/Level.json"]);
    assert!(project.cache.contains("Scenes/Level.json"));
}

// ---------------------------------------------------------------------------
// Pipeline changes
// ---------------------------------------------------------------------------

#[test]
fn removing_a_rule_invalidates_only_its_assets() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["TextureImporter"]);
    project.add_pipeline("Models/AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("Models/Skin.png");
    project.add_file("Textures/a.png");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);

    let skin = manager.cache().get("Models/Skin.png").cloned().unwrap();
    let texture = manager.cache().get("Textures/a.png").cloned().unwrap();

    project.add_pipeline("Models/AssetPipeline.json", &[]);
    manager.queue_path_update(FileChange::modified("Models/AssetPipeline.json"));
    manager.update();

    assert!(manager.cache().get("Models/Hero.gltf").unwrap().is_ignored());
    assert!(!project.cache.contains("Models/Hero.mdl"));
    assert_eq!(manager.cache().get("Models/Skin.png"), Some(&skin));
    assert_eq!(manager.cache().get("Textures/a.png"), Some(&texture));
    assert_eq!(
        manager.last_scan(),
        ScanStats {
            processed: 0,
            up_to_date: 2,
            ignored: 1
        }
    );
}

#[test]
fn adding_a_rule_invalidates_newly_applicable_assets() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("Textures/a.png");
    project.add_file("Textures/b.png");
    project.add_file("Sounds/c.png");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);
    assert!(manager.cache().get("Textures/a.png").unwrap().is_ignored());

    project.add_pipeline("Textures/AssetPipeline.json", &["TextureImporter"]);
    manager.queue_path_update(FileChange::modified("Textures/AssetPipeline.json"));
    manager.update();
    assert_eq!(manager.last_scan().processed, 2);

    settle(&mut manager);
    for name in ["Textures/a.png", "Textures/b.png"] {
        let asset = manager.cache().get(name).unwrap();
        assert_eq!(names(&asset.transformers), ["TextureImporter"]);
    }
    assert!(manager.cache().get("Sounds/c.png").unwrap().is_ignored());
    assert!(project.cache.contains("Textures/a.tex"));
}

#[test]
fn pipeline_dependencies_order_candidates() {
    let project = TestProject::new();
    project.data.insert(
        "AssetPipeline.json",
        br#"{
            "Transformers": [ { "_Class": "ModelImporter" }, { "_Class": "TextureImporter" } ],
            "Dependencies": [ { "Class": "ModelImporter", "DependsOn": "TextureImporter" } ]
        }"#
        .to_vec(),
    );

    let mut manager = project.manager();
    manager.initialize(false);

    let order: Vec<String> = manager
        .hierarchy()
        .candidates("Models/Hero.gltf", &Flavor::any())
        .iter()
        .map(|t| t.type_name().to_owned())
        .collect();
    assert_eq!(order, ["TextureImporter", "ModelImporter"]);
}

#[test]
fn unregistered_transformer_type_invalidates_and_reloads() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter", "TextureImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("Textures/a.png");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);
    assert!(project.cache.contains("Textures/a.tex"));

    assert!(project.registry.unregister("TextureImporter"));
    manager.update();

    assert!(manager.cache().get("Textures/a.png").unwrap().is_ignored());
    assert!(!project.cache.contains("Textures/a.tex"));
    assert_eq!(manager.pipelines()[0].transformers.len(), 1);

    settle(&mut manager);
    assert_eq!(
        names(&manager.cache().get("Models/Hero.gltf").unwrap().transformers),
        ["ModelImporter"]
    );
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

#[test]
fn modified_input_is_reprocessed() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("Models/Villain.gltf");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);
    let before = manager.cache().get("Models/Hero.gltf").unwrap().modification_time;

    project.data.touch("Models/Hero.gltf");
    manager.queue_path_update(FileChange::modified("Models/Hero.gltf"));
    manager.update();
    assert_eq!(manager.last_scan().processed, 1);
    assert_eq!(manager.last_scan().up_to_date, 1);
    assert_eq!(manager.progress().total, 1);

    settle(&mut manager);
    let after = manager.cache().get("Models/Hero.gltf").unwrap().modification_time;
    assert!(after > before);
}

#[test]
fn source_rewrite_is_ignored_once() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["SourceRewriter"]);
    project.add_file("Scripts/a.src");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);
    let recorded = manager.cache().get("Scripts/a.src").unwrap().modification_time;

    // The rewrite itself is reported by the change feed.
    manager.queue_path_update(FileChange::modified("Scripts/a.src"));
    manager.update();
    assert_eq!(manager.last_scan().processed, 0);
    let updated = manager.cache().get("Scripts/a.src").unwrap().modification_time;
    assert!(updated > recorded);

    // A later edit is a real change.
    project.data.touch("Scripts/a.src");
    manager.queue_path_update(FileChange::modified("Scripts/a.src"));
    manager.update();
    assert_eq!(manager.last_scan().processed, 1);
}

#[test]
fn missing_output_makes_asset_stale() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);
    manager.save_state(STATE_FILE).unwrap();

    project.cache.remove("Models/Hero.mdl");

    let mut restarted = project.manager();
    restarted.load_state(STATE_FILE);
    restarted.initialize(false);
    assert_eq!(restarted.last_scan().processed, 1);
    settle(&mut restarted);
    assert!(project.cache.contains("Models/Hero.mdl"));
}

#[test]
fn mark_cache_dirty_forces_reprocessing() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("Other/Villain.gltf");

    let mut manager = project.manager_with(AssetManagerConfig {
        auto_process: false,
        ..AssetManagerConfig::default()
    });
    manager.initialize(false);
    settle(&mut manager);

    manager.mark_cache_dirty("Models");
    manager.update();
    assert_eq!(manager.last_scan().processed, 1);
    assert_eq!(manager.last_scan().up_to_date, 1);
}

#[test]
fn changes_wait_for_a_scan_request_without_auto_processing() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");

    let mut manager = project.manager_with(AssetManagerConfig {
        auto_process: false,
        ..AssetManagerConfig::default()
    });
    manager.initialize(false);
    settle(&mut manager);

    project.add_file("Models/Villain.gltf");
    manager.queue_path_update(FileChange::modified("Models/Villain.gltf"));
    manager.update();
    assert_eq!(manager.queued_requests(), 0);

    manager.request_scan();
    manager.update();
    assert_eq!(manager.queued_requests(), 1);
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

#[test]
fn failed_transform_is_retried_on_next_scan() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["FailingImporter"]);
    project.add_file("broken.bad");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);
    assert!(manager.cache().get("broken.bad").is_none());
    assert!(project.temp.paths().is_empty());

    manager.request_scan();
    manager.update();
    assert_eq!(manager.last_scan().processed, 1);
}

#[test]
fn concurrency_limit_bounds_in_flight_requests() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    for i in 0..5 {
        project.add_file(&format!("Models/m{i}.gltf"));
    }

    let processor = DeferredProcessor::default();
    let mut manager = project.manager_with(AssetManagerConfig {
        concurrency: 2,
        ..AssetManagerConfig::default()
    });
    manager.set_processor(Box::new(processor.clone()));
    manager.initialize(false);
    assert_eq!(manager.queued_requests(), 5);

    manager.update();
    assert_eq!(processor.running(), 2);
    assert_eq!(manager.in_flight_requests(), 2);
    assert_eq!(manager.queued_requests(), 3);

    manager.update();
    assert_eq!(processor.running(), 2);

    while !manager.is_settled() {
        processor.complete_all();
        manager.update();
        assert!(manager.in_flight_requests() <= 2);
    }

    assert_eq!(processor.peak(), 2);
    assert_eq!(manager.cache().len(), 5);
    assert_eq!(manager.progress().completed, 5);
}

#[test]
fn read_only_worker_processes_requests_without_caching() {
    let project = TestProject::new();
    project.add_pipeline("Models/AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");

    let mut worker = project.manager();
    worker.initialize(true);
    assert_eq!(worker.state(), ManagerState::Settled);
    assert_eq!(worker.queued_requests(), 0);

    let request = TransformRequest {
        resource_name: "Models/Hero.gltf".into(),
        flavor: Flavor::any(),
        input_file: "data/Models/Hero.gltf".into(),
        output_file: "temp/job/Models/Hero.gltf".into(),
        temp_path: "temp/job".into(),
        input_modification_time: FileTime::from_millis(1),
    };
    let result = worker.process_request(&request);

    assert!(result.is_success());
    assert!(project.cache.contains("Models/Hero.mdl"));
    assert!(worker.cache().is_empty());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn saved_state_round_trips() {
    let project = TestProject::new();
    project.add_pipeline("Models/AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.add_file("notes.txt");

    let mut manager = project.manager();
    manager.initialize(false);
    settle(&mut manager);
    manager.save_state(STATE_FILE).unwrap();

    let bytes = poll_now(project.vfs().read(STATE_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        json["Assets"]["Models/Hero.gltf"]["Outputs"][0],
        "Models/Hero.mdl"
    );
    assert!(json["AssetPipelineModificationTimes"]["Models/AssetPipeline.json"].is_u64());

    let loaded = AssetCache::from_json(&bytes, STATE_FILE).unwrap();
    let original: Vec<_> = manager.cache().assets().cloned().collect();
    let restored: Vec<_> = loaded.assets().cloned().collect();
    assert_eq!(original, restored);
    assert_eq!(loaded.pipeline_times(), manager.cache().pipeline_times());
}

#[test]
fn corrupt_state_file_is_tolerated() {
    let project = TestProject::new();
    project.add_pipeline("AssetPipeline.json", &["ModelImporter"]);
    project.add_file("Models/Hero.gltf");
    project.project.insert("AssetCache.json", b"{ not json".to_vec());

    let mut manager = project.manager();
    manager.load_state(STATE_FILE);
    assert!(manager.cache().is_empty());

    manager.initialize(false);
    assert_eq!(manager.last_scan().processed, 1);
}
