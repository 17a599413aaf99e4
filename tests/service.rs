//! End-to-end flow through the public `Service` API: two sessions upload,
//! list, download, bundle and delete, with retention sweeping in between.
//!
//! Uses the real pure-Rust codec and a file sentinel inside a temp dir, with a
//! manual clock so the cleanup interval can be crossed without sleeping.

use filetime::FileTime;
use image::{ImageEncoder, RgbImage};
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use webp_shelf::clock::ManualClock;
use webp_shelf::config::{ServiceConfig, load_config};
use webp_shelf::convert::ConversionError;
use webp_shelf::imaging::RustCodec;
use webp_shelf::naming::{Owner, PrefixAuthorizer};
use webp_shelf::retention::{FileSentinel, SentinelStore};
use webp_shelf::service::{Collaborators, Service, Upload};
use webp_shelf::store::{StoreError, ZipArchiver};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 90])
    })
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(gradient(width, height).as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(gradient(width, height).as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

fn upload(name: &str, mime: &str, bytes: Vec<u8>) -> Upload {
    Upload {
        file_name: name.into(),
        mime: mime.into(),
        bytes,
    }
}

fn set_age(path: &Path, age: Duration) {
    let when = SystemTime::now() - age;
    filetime::set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
}

struct Harness {
    _tmp: TempDir,
    root: PathBuf,
    clock: Arc<ManualClock>,
    sentinel: Arc<FileSentinel>,
    service: Service,
}

fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let mut config = ServiceConfig::default();
    config.storage.uploads_dir = root.join("uploads");
    config.storage.converted_dir = root.join("converted");
    config.storage.sentinel_path = Some(root.join("state").join("cleanup.lock"));

    let clock = Arc::new(ManualClock::starting_now());
    let sentinel = Arc::new(FileSentinel::new(root.join("state").join("cleanup.lock")));
    let service = Service::new(
        config,
        Collaborators {
            codec: Arc::new(RustCodec::new()),
            clock: clock.clone(),
            sentinel: sentinel.clone(),
            authorizer: Arc::new(PrefixAuthorizer),
            archiver: Arc::new(ZipArchiver),
        },
    )
    .unwrap();

    Harness {
        _tmp: tmp,
        root,
        clock,
        sentinel,
        service,
    }
}

#[test]
fn two_sessions_share_storage_but_not_files() {
    let h = harness();
    let abc = Owner::new("user_abc").unwrap();
    let xyz = Owner::new("user_xyz").unwrap();

    let first = h
        .service
        .upload(&abc, vec![upload("cat.jpg", "image/jpeg", jpeg(120, 80))]);
    h.clock.advance(Duration::from_secs(3));
    let second = h
        .service
        .upload(&abc, vec![upload("dog.png", "image/png", png(64, 64))]);
    let cat = first[0].result.as_ref().unwrap().artifact.name.clone();
    let dog = second[0].result.as_ref().unwrap().artifact.name.clone();
    assert!(cat.starts_with("user_abc_") && cat.ends_with(".webp"));

    // Newest first.
    let listed: Vec<String> = h.service.list(&abc).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(listed, vec![dog.clone(), cat.clone()]);

    // The other session sees nothing and cannot reach either file.
    assert!(h.service.list(&xyz).unwrap().is_empty());
    assert!(matches!(h.service.download(&xyz, &cat), Err(StoreError::Unauthorized)));
    assert!(matches!(
        h.service.download(&xyz, &format!("../converted/{cat}")),
        Err(StoreError::Unauthorized)
    ));
    assert!(matches!(h.service.download_all(&xyz), Err(StoreError::Empty)));

    // Bundle holds both files under their stored names.
    let bundle = h.service.download_all(&abc).unwrap();
    assert_eq!(bundle.content_type, "application/zip");
    assert!(bundle.file_name.starts_with("webp_images_"));
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bundle.bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    let mut expected = vec![cat.clone(), dog.clone()];
    expected.sort();
    assert_eq!(names, expected);

    let single = h.service.download(&abc, &cat).unwrap();
    let mut zipped = Vec::new();
    archive.by_name(&cat).unwrap().read_to_end(&mut zipped).unwrap();
    assert_eq!(zipped, single.bytes);

    h.service.delete(&abc, &cat).unwrap();
    assert!(matches!(h.service.download(&abc, &cat), Err(StoreError::NotFound(_))));

    let stats = h.service.stats(&abc).unwrap();
    assert_eq!(stats.converted_files, 1);
    assert_eq!(stats.pending_uploads, 0);
}

#[test]
fn bad_files_in_a_batch_leave_no_trace() {
    let h = harness();
    let abc = Owner::new("user_abc").unwrap();

    let outcomes = h.service.upload(
        &abc,
        vec![
            upload("a.jpg", "image/jpeg", jpeg(16, 16)),
            upload("b.bmp", "image/bmp", vec![0; 64]),
            upload("c.png", "image/png", b"not a png".to_vec()),
        ],
    );
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(outcomes[1].result, Err(ConversionError::UnsupportedFormat(_))));
    assert!(matches!(outcomes[2].result, Err(ConversionError::DecodeFailed(_))));

    assert_eq!(std::fs::read_dir(h.root.join("uploads")).unwrap().count(), 0);
    assert_eq!(h.service.list(&abc).unwrap().len(), 1);
}

#[test]
fn expired_files_are_swept_once_per_interval() {
    let h = harness();
    let abc = Owner::new("user_abc").unwrap();

    // First request sweeps and stamps the sentinel.
    assert!(h.service.list(&abc).unwrap().is_empty());
    let first_run = h.sentinel.last_run().unwrap().unwrap();

    let kept = h.service.upload(&abc, vec![upload("a.png", "image/png", png(8, 8))]);
    let kept = kept[0].result.as_ref().unwrap().artifact.path.clone();
    let stale = h.service.upload(&abc, vec![upload("b.png", "image/png", png(8, 8))]);
    let stale = stale[0].result.as_ref().unwrap().artifact.path.clone();
    set_age(&stale, DAY * 8);
    let leftover = h.root.join("uploads").join("0f0f_forgotten.jpg");
    std::fs::write(&leftover, b"zz").unwrap();
    set_age(&leftover, DAY * 8);

    // Inside the interval nothing is swept.
    assert_eq!(h.service.list(&abc).unwrap().len(), 2);
    assert_eq!(h.sentinel.last_run().unwrap(), Some(first_run));

    h.clock.advance(DAY + Duration::from_secs(1));
    let listed = h.service.list(&abc).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].path, kept);
    assert!(!stale.exists());
    assert!(!leftover.exists());
    assert!(h.sentinel.last_run().unwrap().unwrap() > first_run);
}

#[test]
fn manual_cleanup_ignores_the_interval() {
    let h = harness();
    let abc = Owner::new("user_abc").unwrap();
    h.service.stats(&abc).unwrap();

    let out = h.service.upload(&abc, vec![upload("a.png", "image/png", png(8, 8))]);
    let path = out[0].result.as_ref().unwrap().artifact.path.clone();
    let size = std::fs::metadata(&path).unwrap().len();
    set_age(&path, DAY * 30);

    let report = h.service.manual_cleanup();
    assert_eq!(report.total_deleted(), 1);
    assert_eq!(report.total_bytes_freed(), size);
    assert_eq!(
        report.for_directory(&h.root.join("converted")).unwrap().deleted,
        1
    );
    assert!(h.service.list(&abc).unwrap().is_empty());
}

#[test]
fn service_from_config_file() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let config_path = root.join("webp-shelf.toml");
    std::fs::write(
        &config_path,
        format!(
            "[storage]\nuploads_dir = {:?}\nconverted_dir = {:?}\nsentinel_path = {:?}\n\n[uploads]\nmax_file_size = 1024\n",
            root.join("in"),
            root.join("out"),
            root.join("cleanup.lock"),
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let service = Service::from_config(config).unwrap();
    let abc = Owner::new("user_abc").unwrap();

    let outcomes = service.upload(&abc, vec![upload("big.jpg", "image/jpeg", vec![0; 2048])]);
    assert!(matches!(
        outcomes[0].result,
        Err(ConversionError::FileTooLarge { size: 2048, max: 1024 })
    ));
    assert!(root.join("in").is_dir());
    assert!(root.join("out").is_dir());
    assert!(root.join("cleanup.lock").exists());
    assert!(service.stats(&abc).unwrap().last_cleanup.is_some());
}
