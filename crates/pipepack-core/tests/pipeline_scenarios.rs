//! End-to-end pipeline runs against temporary project trees.

use pipepack_core::events::drain_events;
use pipepack_core::{
    BuildConfig, BuildOutcome, Error, Pipeline, PipelineEvent, Reporter, WorkerDeclaration,
};
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn config(scripts: &[(&str, &str)]) -> BuildConfig {
    BuildConfig {
        scripts: scripts
            .iter()
            .map(|(id, cmd)| WorkerDeclaration::new(*id, *cmd))
            .collect(),
        ..BuildConfig::default()
    }
}

/// A `build:ts` worker that echoes its input: the output is the input with
/// the extension remapped and relative imports rewritten.
#[cfg(unix)]
#[tokio::test]
async fn echo_worker_remaps_and_rewrites() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "src/a.ts", "export const x = 1;\nimport z from './b.ts';");
    write(root, "src/a.test.ts", "import './a.ts';");
    write(root, "src/__tests__/a.ts", "");

    let (reporter, mut rx) = Reporter::channel();
    let pipeline = Pipeline::new(root, config(&[("build:ts", "cat")])).with_reporter(reporter);
    let layout = pipeline.layout();
    let outcome = pipeline.run().await.unwrap();

    let BuildOutcome::Built(report) = outcome else {
        panic!("expected a build");
    };
    assert!(report.is_success());
    assert_eq!(report.files_written, 1);

    let out = std::fs::read_to_string(layout.dist_dir.join("a.js")).unwrap();
    assert_eq!(out, "export const x = 1;\nimport z from './b.js';");
    assert!(!layout.dist_dir.join("a.ts").exists());
    assert!(!layout.dist_dir.join("a.test.js").exists());
    assert!(!layout.dist_dir.join("__tests__").exists());

    let events = drain_events(&mut rx);
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::WorkerUpdate { id, .. }) if id == "build:ts"
    ));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::WorkerComplete { id, error: None }) if id == "build:ts"
    ));
}

#[tokio::test]
async fn mount_copies_directory_verbatim() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "static/logo.svg", "<svg/>");
    write(root, "static/fonts/a.woff2", "font");
    write(root, "src/data.json", "{}");

    let pipeline = Pipeline::new(
        root,
        config(&[("mount:static", "mount static"), ("plugin:json", "json")]),
    );
    let layout = pipeline.layout();
    let BuildOutcome::Built(report) = pipeline.run().await.unwrap() else {
        panic!("expected a build");
    };

    assert_eq!(report.files_mounted, 2);
    assert_eq!(
        std::fs::read_to_string(layout.build_dir.join("static/logo.svg")).unwrap(),
        "<svg/>"
    );
    assert!(layout.build_dir.join("static/fonts/a.woff2").exists());
}

#[tokio::test]
async fn malformed_mount_aborts_before_any_write() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "src/data.json", "{}");
    write(root, "build/stale.txt", "from a previous run");

    let (reporter, mut rx) = Reporter::channel();
    let err = Pipeline::new(
        root,
        config(&[("plugin:json", "json"), ("mount:public", "copy public")]),
    )
    .with_reporter(reporter)
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::InvalidMount { ref id, .. } if id == "mount:public"));
    assert!(err.is_configuration());
    assert_eq!(
        std::fs::read_to_string(root.join("build/stale.txt")).unwrap(),
        "from a previous run"
    );
    assert!(!root.join("build/_dist_").exists());
    assert!(drain_events(&mut rx).is_empty());
}

#[tokio::test]
async fn mount_of_missing_directory_is_fatal() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "src/data.json", "{}");

    let err = Pipeline::new(
        root,
        config(&[("mount:public", "mount public"), ("plugin:json", "json")]),
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Mount { .. }));
    assert!(!root.join("build/_dist_/data.json").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn bundle_stage_prepares_manifest_and_runs_bundler() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "package.json",
        r#"{"name": "my-app", "version": "0.1.0", "dependencies": {"preact": "^10.0.0"}}"#,
    );
    write(root, "public/index.html", "<script type=module src=/_dist_/index.js></script>");
    write(root, "src/index.js", "import { h } from 'preact';");
    write(root, "web_modules/preact.js", "export const h = 1;");
    write(
        root,
        "web_modules/import-map.json",
        r#"{"imports": {"preact": "./preact.js"}}"#,
    );

    // Records what it was given, then exits successfully.
    let bundler = root.join("fake-bundler");
    write(
        root,
        "fake-bundler",
        "#!/bin/sh\n\
         echo \"bundling $2\"\n\
         cp package.json \"$4/seen-package.json\"\n\
         cp .babelrc \"$4/seen-babelrc\"\n\
         cp _dist_/index.js \"$4/seen-index.js\"\n",
    );
    std::fs::set_permissions(&bundler, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = config(&[
        ("mount:public", "mount public --to /"),
        ("build:js", "cat"),
    ]);
    config.bundle.enabled = true;
    config.bundle.bundler = bundler.to_string_lossy().into_owned();

    let (reporter, mut rx) = Reporter::channel();
    let pipeline = Pipeline::new(root, config).with_reporter(reporter);
    let layout = pipeline.layout();
    let BuildOutcome::Built(report) = pipeline.run().await.unwrap() else {
        panic!("expected a build");
    };
    assert!(report.bundled);

    let final_dir = &layout.final_dir;
    assert!(final_dir.join("index.html").exists());
    assert!(!final_dir.join("web_modules").exists());
    assert!(!final_dir.join("_dist_").exists());
    assert!(!layout.build_dir.exists(), "intermediate dir is removed");

    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(final_dir.join("seen-package.json")).unwrap(),
    )
    .unwrap();
    assert!(manifest.get("name").is_none());
    assert_eq!(manifest["version"], "0.1.0");
    assert_eq!(manifest["devDependencies"]["@babel/core"], "^7.9.0");

    let babelrc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(final_dir.join("seen-babelrc")).unwrap())
            .unwrap();
    assert_eq!(
        babelrc["plugins"][0][0],
        "@babel/plugin-syntax-import-meta"
    );

    assert_eq!(
        std::fs::read_to_string(final_dir.join("seen-index.js")).unwrap(),
        "import { h } from '/web_modules/preact.js';"
    );

    let events = drain_events(&mut rx);
    let marker = format!("bundle:{}", bundler.display());
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::WorkerMsg { id, text, .. } if *id == marker && text == "bundling index.html"
    )));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::WorkerComplete { id, error: None }) if *id == marker
    ));
}

#[cfg(unix)]
fn fake_bundler(root: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = root.join("fake-bundler");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

#[cfg(unix)]
#[tokio::test]
async fn bundle_waits_for_lint_workers() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "src/data.json", "{}");
    let marker = root.join("lint-done");

    let mut config = config(&[
        ("lintall:slow", "sleep 0.2; touch lint-done"),
        ("plugin:json", "json"),
    ]);
    config.bundle.enabled = true;
    config.bundle.bundler = fake_bundler(
        root,
        &format!(
            "[ -f '{}' ] || {{ echo 'lint still running' >&2; exit 1; }}",
            marker.display()
        ),
    );

    let (reporter, mut rx) = Reporter::channel();
    let BuildOutcome::Built(report) = Pipeline::new(root, config)
        .with_reporter(reporter)
        .run()
        .await
        .unwrap()
    else {
        panic!("expected a build");
    };
    assert!(report.bundled);
    assert!(report.lint_failures.is_empty());

    let events = drain_events(&mut rx);
    let lint_done = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::WorkerComplete { id, .. } if id == "lintall:slow"))
        .unwrap();
    let bundle_start = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::WorkerUpdate { id, .. } if id.starts_with("bundle:")))
        .unwrap();
    assert!(lint_done < bundle_start);
}

#[cfg(unix)]
#[tokio::test]
async fn fatal_mount_error_skips_bundle() {
    for (mount, expect_invalid) in [("mount nope", false), ("copy public", true)] {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/data.json", "{}");
        let sentinel = root.join("bundler-ran");

        let mut config = config(&[("plugin:json", "json"), ("mount:public", mount)]);
        config.bundle.enabled = true;
        config.bundle.bundler = fake_bundler(root, &format!("touch '{}'", sentinel.display()));

        let (reporter, mut rx) = Reporter::channel();
        let err = Pipeline::new(root, config)
            .with_reporter(reporter)
            .run()
            .await
            .unwrap_err();

        if expect_invalid {
            assert!(matches!(err, Error::InvalidMount { .. }), "{mount}: {err}");
        } else {
            assert!(matches!(err, Error::Mount { .. }), "{mount}: {err}");
        }
        assert!(!sentinel.exists(), "{mount}: bundler must not start");
        assert!(!drain_events(&mut rx).iter().any(|e| matches!(
            e,
            PipelineEvent::WorkerUpdate { id, .. } if id.starts_with("bundle:")
        )));
    }
}
