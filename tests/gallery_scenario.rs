//! End-to-end flows against the local filesystem backend.

use gallery_kit::adapter::PersistenceAdapter;
use gallery_kit::adapter::fs::FsAdapter;
use gallery_kit::config::GalleryConfig;
use gallery_kit::crop::{CropError, CropPhase, CropSession, PixelRect, Selection};
use gallery_kit::ordering;
use gallery_kit::selection::SelectionSet;
use gallery_kit::store::{ImageStore, StoreError};
use gallery_kit::types::{ImageRecord, ImageType};
use gallery_kit::upload::UploadFile;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;

fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, shade])
    }));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn open(root: &TempDir) -> ImageStore<FsAdapter> {
    let adapter = FsAdapter::new(root.path()).with_base_url("https://cdn.example.com");
    let mut store = ImageStore::new(adapter, "project-1", &GalleryConfig::default());
    store.load().unwrap();
    store
}

/// `(caption, display_order)` pairs in list order.
fn orders(images: &[ImageRecord]) -> Vec<(&str, u32)> {
    images
        .iter()
        .map(|i| (i.caption.as_deref().unwrap_or(""), i.display_order))
        .collect()
}

/// Upload three distinct gallery images and caption them A, B, C.
fn seed_abc(store: &mut ImageStore<FsAdapter>) {
    let files = ["a.png", "b.png", "c.png"]
        .iter()
        .enumerate()
        .map(|(i, name)| UploadFile::new(*name, "image/png", png(8, 8, i as u8)))
        .collect();
    let report = store.upload(files, ImageType::Gallery);
    assert!(report.is_complete(), "{:?}", report.failed);

    let ids: Vec<String> = store.images().iter().map(|i| i.id.clone()).collect();
    for (id, caption) in ids.iter().zip(["A", "B", "C"]) {
        store
            .update_details(
                id,
                gallery_kit::types::ImageDetails::new(None, Some(caption.to_string())),
            )
            .unwrap();
    }
}

#[test]
fn reorder_then_bulk_delete_persists_dense_order() {
    let root = TempDir::new().unwrap();
    let mut store = open(&root);
    seed_abc(&mut store);
    assert_eq!(
        orders(store.images()),
        [("A", 0), ("B", 1), ("C", 2)]
    );

    // Drag B to the front
    assert!(store.move_image(1, 0).unwrap());
    assert_eq!(
        orders(store.images()),
        [("B", 0), ("A", 1), ("C", 2)]
    );

    // Select A and delete it
    let a_id = store.images()[1].id.clone();
    let mut selection = SelectionSet::new();
    selection.toggle(&a_id, true);
    assert_eq!(selection.bulk_delete(&mut store).unwrap(), 1);
    assert!(selection.is_empty());
    assert_eq!(orders(store.images()), [("B", 0), ("C", 1)]);

    // A fresh store over the same directory sees the same thing
    let reopened = open(&root);
    assert_eq!(orders(reopened.images()), [("B", 0), ("C", 1)]);
    assert!(ordering::is_dense(reopened.images()));
}

#[test]
fn banner_promotion_then_densify() {
    let root = TempDir::new().unwrap();
    let mut store = open(&root);
    seed_abc(&mut store);

    let c_id = store.images()[2].id.clone();
    store.set_banner(&c_id).unwrap();
    assert_eq!(store.images()[0].id, c_id);
    assert!(!ordering::is_dense(store.images()));

    assert!(store.densify().unwrap());
    let reopened = open(&root);
    assert_eq!(
        orders(reopened.images()),
        [("C", 0), ("A", 0), ("B", 1)]
    );
}

#[test]
fn duplicate_content_shares_one_blob() {
    let root = TempDir::new().unwrap();
    let mut store = open(&root);
    let bytes = png(8, 8, 7);
    let report = store.upload(
        vec![
            UploadFile::new("one.png", "image/png", bytes.clone()),
            UploadFile::new("two.png", "image/png", bytes),
        ],
        ImageType::Gallery,
    );
    let [one, two] = report.uploaded.as_slice() else {
        panic!("expected two uploads, got {:?}", report.failed);
    };
    assert_ne!(one.id, two.id);
    assert_eq!(one.storage_path, two.storage_path);
    let blob = root.path().join(one.storage_path.as_deref().unwrap());

    store.remove(std::slice::from_ref(&one.id)).unwrap();
    assert!(blob.exists());
    store.remove(std::slice::from_ref(&two.id)).unwrap();
    assert!(!blob.exists());
}

#[test]
fn rejected_and_accepted_uploads_are_reported_separately() {
    let root = TempDir::new().unwrap();
    let mut store = open(&root);
    let report = store.upload(
        vec![
            UploadFile::new("ok.png", "image/png", png(4, 4, 1)),
            UploadFile::new("notes.txt", "text/plain", b"hello".to_vec()),
        ],
        ImageType::Banner,
    );
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.failed[0].name, "notes.txt");
    assert!(matches!(
        report.into_result(),
        Err(StoreError::PartialUpload { uploaded: 1, .. })
    ));
    assert_eq!(open(&root).len(), 1);
}

#[test]
fn crop_stored_image_and_upload_result() {
    let root = TempDir::new().unwrap();
    let mut store = open(&root);
    let report = store.upload(
        vec![UploadFile::new("hero.png", "image/png", png(1600, 900, 0))],
        ImageType::Banner,
    );
    let hero = report.uploaded[0].clone();
    let bytes = store.adapter().read_blob(&hero).unwrap();

    let config = GalleryConfig::default();
    let mut session = CropSession::for_image_type(&config.crop, hero.image_type);
    session.load_bytes(&bytes).unwrap();
    // Preview drawn at half size
    session.set_rendered_size(800, 450).unwrap();
    session.begin_selection().unwrap();
    session
        .set_selection(Selection::pixels(100.0, 50.0, 320.0, 180.0))
        .unwrap();

    let output = session.apply().unwrap().clone();
    assert_eq!(
        output.rect,
        PixelRect {
            x: 200,
            y: 100,
            width: 640,
            height: 360
        }
    );
    assert_eq!(session.phase(), &CropPhase::Completed);

    let out = root.path().join("hero-cropped.jpg");
    session.export_to(&out).unwrap();
    let written = image::load_from_memory(&std::fs::read(&out).unwrap()).unwrap();
    assert_eq!((written.width(), written.height()), (640, 360));

    let report = store.upload(
        vec![UploadFile::new("hero-cropped.jpg", "image/jpeg", output.jpeg)],
        ImageType::Banner,
    );
    assert_eq!(report.uploaded[0].display_order, 1);
    assert_eq!(store.adapter().list_images("project-1").unwrap().len(), 2);
}

#[test]
fn crop_rejects_small_source() {
    let config = GalleryConfig::default();
    let mut session = CropSession::new(&config.crop);
    let err = session.load_bytes(&png(300, 200, 0)).unwrap_err();
    assert!(matches!(err, CropError::Dimension { .. }));
    assert!(matches!(session.phase(), CropPhase::Failed(_)));
    assert!(session.begin_selection().is_err());
}
