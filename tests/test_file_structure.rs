//! Cross-reference exactness and whole-file structure.

mod common;

use common::{find, object_at, parse_tail};
use pdf_forge::{DocumentWriter, Orientation, ResourceSpec, WriterConfig};

fn writer() -> DocumentWriter<Vec<u8>> {
    let _ = env_logger::builder().is_test(true).try_init();
    DocumentWriter::from_writer(Vec::new(), WriterConfig::default()).unwrap()
}

/// Build one page with a trivial content stream.
fn add_page<W: std::io::Write>(doc: &mut DocumentWriter<W>, orientation: Orientation) {
    let page = doc.new_page(orientation);
    let mut strm = doc.new_stream();
    strm.append_cmd("BT ET\n");
    let contents = strm.close(doc).unwrap();
    let resources = doc.resources(&ResourceSpec::new()).unwrap();
    doc.set_page_contents(page, contents);
    doc.set_page_resources(page, resources);
    doc.finish_page(page).unwrap();
}

#[test]
fn test_xref_has_one_record_per_object_plus_head() {
    let mut doc = writer();
    for i in 0..5 {
        let id = doc.alloc();
        doc.open_object(id, None).unwrap();
        doc.put_int("Index", i).unwrap();
        doc.close_object(id).unwrap();
    }
    let allocated_before_finalize = doc.object_count();
    let bytes = doc.finalize().unwrap();
    let tail = parse_tail(&bytes);

    // Finalize adds the empty page root and the catalog.
    assert_eq!(tail.size, allocated_before_finalize + 2 + 1);
    assert_eq!(tail.records.len(), tail.size);

    // The reserved head record.
    assert!(!tail.records[0].in_use);
    assert_eq!(tail.records[0].generation, 65535);
}

#[test]
fn test_offsets_match_object_headers_exactly() {
    let mut doc = writer();
    for _ in 0..4 {
        add_page(&mut doc, Orientation::Portrait);
    }
    let bytes = doc.finalize().unwrap();
    let tail = parse_tail(&bytes);

    for number in 1..tail.size as u32 {
        let record = tail.records[number as usize];
        assert!(record.in_use, "object {} closed", number);
        let header = format!("{} 0 obj", number);
        assert!(
            bytes[record.offset as usize..].starts_with(header.as_bytes()),
            "object {} begins at its recorded offset",
            number
        );
    }
}

#[test]
fn test_end_to_end_mixed_orientation_document() {
    let mut doc = writer();
    doc.set_title("Mixed").unwrap();
    doc.start_chapter(None);
    add_page(&mut doc, Orientation::Portrait);
    add_page(&mut doc, Orientation::Landscape);
    add_page(&mut doc, Orientation::Landscape);
    // Finalize allocates the merge root, two more outline destination
    // entries (the untitled chapter's id doubles as the first), and the
    // catalog.
    let allocated = doc.object_count() + 4;
    let bytes = doc.finalize().unwrap();
    let tail = parse_tail(&bytes);

    // Size covers every allocated object plus the reserved head.
    assert_eq!(tail.size, allocated + 1);
    assert!(tail.trailer.contains(&format!("/Size {}", tail.size)));

    // Root resolves to the catalog.
    let root = tail.trailer_ref("Root").expect("Root in trailer");
    let catalog = object_at(&bytes, &tail, root);
    assert!(find(catalog, b"/Type/Catalog", 0).is_some());

    // Info is present because a title was set.
    let info = tail.trailer_ref("Info").expect("Info in trailer");
    let info_obj = object_at(&bytes, &tail, info);
    assert!(find(info_obj, b"/Title (Mixed)", 0).is_some());

    // The synthetic merge root has exactly two kids and counts all
    // three leaves.
    let pages_at = find(catalog, b"/Pages ", 0).unwrap() + b"/Pages ".len();
    let pages_num: u32 = std::str::from_utf8(&catalog[pages_at..])
        .unwrap()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap();
    let pages_root = object_at(&bytes, &tail, pages_num);
    assert!(find(pages_root, b"/Type/Pages", 0).is_some());
    assert!(find(pages_root, b"/Count 3", 0).is_some());
    let kids_start = find(pages_root, b"/Kids [", 0).unwrap();
    let kids_end = find(pages_root, b" ]", kids_start).unwrap();
    let kid_count = pages_root[kids_start..kids_end]
        .windows(4)
        .filter(|w| w == b" 0 R")
        .count();
    assert_eq!(kid_count, 2);
    // The merge root itself carries no media box.
    assert!(find(&pages_root[..kids_end], b"/MediaBox", 0).is_none());
}

#[test]
fn test_single_orientation_has_no_merge_root() {
    let mut doc = writer();
    add_page(&mut doc, Orientation::Portrait);
    add_page(&mut doc, Orientation::Portrait);
    let bytes = doc.finalize().unwrap();
    let tail = parse_tail(&bytes);

    let root = tail.trailer_ref("Root").unwrap();
    let catalog = object_at(&bytes, &tail, root);
    let pages_at = find(catalog, b"/Pages ", 0).unwrap() + b"/Pages ".len();
    let pages_num: u32 = std::str::from_utf8(&catalog[pages_at..])
        .unwrap()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap();
    let pages_root = object_at(&bytes, &tail, pages_num);

    // The group is the page tree root directly, so it carries the
    // orientation's media box.
    assert!(find(pages_root, b"/MediaBox[0 0 612 792]", 0).is_some());
    assert!(find(pages_root, b"/Count 2", 0).is_some());

    // Exactly one page tree node in the whole file.
    let mut nodes = 0;
    let mut at = 0;
    while let Some(p) = find(&bytes, b"/Type/Pages", at) {
        nodes += 1;
        at = p + 1;
    }
    assert_eq!(nodes, 1);
}

#[test]
fn test_catalog_opens_with_outline_visible() {
    let mut doc = writer();
    add_page(&mut doc, Orientation::Portrait);
    let bytes = doc.finalize().unwrap();
    let tail = parse_tail(&bytes);
    let root = tail.trailer_ref("Root").unwrap();
    let catalog = object_at(&bytes, &tail, root);
    assert!(find(catalog, b"/PageMode/UseOutlines", 0).is_some());
    assert!(find(catalog, b"/Outlines ", 0).is_some());
}

#[test]
fn test_create_writes_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.pdf");
    let mut doc = DocumentWriter::create(&path, WriterConfig::default()).unwrap();
    add_page(&mut doc, Orientation::Portrait);
    doc.finalize().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.3\n"));
    let tail = parse_tail(&bytes);
    assert!(tail.records[1..].iter().all(|r| r.in_use));
}

#[test]
fn test_create_failure_is_fatal() {
    let result = DocumentWriter::create("/no/such/dir/out.pdf", WriterConfig::default());
    assert!(matches!(result, Err(pdf_forge::Error::Create { .. })));
}

#[test]
fn test_header_and_footer_frame_the_file() {
    let doc = writer();
    let bytes = doc.finalize().unwrap();
    assert!(bytes.starts_with(b"%PDF-1.3\n"));
    assert!(bytes.ends_with(b"%%EOF\n"));
    let tail = parse_tail(&bytes);
    assert_eq!(&bytes[tail.xref_offset as usize..tail.xref_offset as usize + 5], b"xref\n");
}
