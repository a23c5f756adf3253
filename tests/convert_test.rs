mod common;

use std::fs;
use std::io::Cursor;
use std::path::Path;

use tempfile::TempDir;
use webbook::modes::convert::convert_reader;
use webbook::ui::Interaction;
use webbook::{ConvertOptions, Error, OrderSpec, Summary};

fn options(out: &Path, template: &Path) -> ConvertOptions {
    let mut options = ConvertOptions::new("book.epub", out);
    options.template = Some(template.to_path_buf());
    options
}

fn setup() -> (TempDir, ConvertOptions) {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.html");
    fs::write(&template, common::TEMPLATE).unwrap();
    let options = options(&dir.path().join("out"), &template);
    (dir, options)
}

fn run(book: Vec<u8>, options: &ConvertOptions) -> webbook::Result<Summary> {
    convert_reader(Cursor::new(book), options, Interaction::non_interactive())
}

fn read(options: &ConvertOptions, path: &str) -> String {
    fs::read_to_string(options.output_dir.join(path)).unwrap()
}

#[test]
fn test_convert_layout() {
    let (_dir, options) = setup();
    let summary = run(common::book(), &options).unwrap();

    assert_eq!(summary.processed, 6);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.written, 6);

    let out = &options.output_dir;
    for path in ["Contents.html", "ch1.html", "ch2.html", "css/main.css", "img/cover.png", "etc/a.ttf"] {
        assert!(out.join(path).is_file(), "{path} missing");
    }
    assert_eq!(fs::read(out.join("img/cover.png")).unwrap(), common::PNG);
}

#[test]
fn test_content_page() {
    let (_dir, options) = setup();
    run(common::book(), &options).unwrap();
    let page = read(&options, "ch1.html");

    assert!(page.contains("<title>Chapter One | Test Book</title>"));
    assert!(page.contains(r#"<meta name="description" content="Test Book by Ann Author">"#));
    assert!(!page.contains("Old title"));
    assert!(page.contains(r#"<link rel="stylesheet" type="text/css" href="css/main.css">"#));
    assert!(page.contains("<header>Test Book</header>"));
    assert!(page.contains(r#"<a href="ch2.html#start">next</a>"#));
    assert!(page.contains(r#"<img src="img/cover.png" alt="cover">"#));
    assert!(page.contains(r#"<a href="/suttas/MN/MN10.html" class="sutta-ref">MN 10</a>"#));

    // Spine: contents, ch1, ch2.
    assert!(page.contains(r#"<div id="nextbutton"><a href="Contents.html" class="next"><img src="/images/actions/go-next-button2.png" title="Previous page"></a>"#));
    assert!(page.contains(r#"<a href="ch2.html" class="next">"#));

    let last = read(&options, "ch2.html");
    assert!(last.contains("<title>Chapter Two | Test Book</title>"));
    assert!(!last.contains("Next page"));
}

#[test]
fn test_contents_page() {
    let (_dir, options) = setup();
    run(common::book(), &options).unwrap();
    let page = read(&options, "Contents.html");

    assert!(page.contains("<title>Contents | Test Book</title>"));
    assert!(page.contains(r#"<link href="css/main.css" rel="stylesheet" type="text/css">"#));
    assert!(page.contains("<h1>Contents</h1>"));
    assert!(page.contains(r#"<ul class="no-ind">"#));
    assert!(page.contains(r#"<a href="Contents.html">Table of Contents</a>"#));
    assert!(page.contains(r#"<a href="ch1.html">Chapter One</a>"#));
    assert!(page.contains(r#"<a href="ch2.html#start">Chapter Two</a>"#));
    assert!(!page.contains("Previous page"));
}

#[test]
fn test_stylesheet_urls_rewritten() {
    let (_dir, options) = setup();
    run(common::book(), &options).unwrap();
    assert_eq!(
        read(&options, "css/main.css"),
        "body { background: url(../img/cover.png) no-repeat; }\n"
    );
}

#[test]
fn test_spine_order_moves_navigation_and_contents() {
    let (_dir, mut options) = setup();
    options.spine_order = OrderSpec::new(vec![2, 0]);
    run(common::book(), &options).unwrap();

    // Spine is now ch2, contents, ch1.
    let first = read(&options, "ch2.html");
    assert!(!first.contains("Previous page"));
    assert!(first.contains(r#"<a href="Contents.html" class="next"><img src="/images/actions/go-next-button2.png" title="Next page">"#));
    assert!(!read(&options, "ch1.html").contains("Next page"));

    // The contents order follows the spine order.
    let contents = read(&options, "Contents.html");
    let two = contents.find("Chapter Two").unwrap();
    let toc = contents.find(">Table of Contents<").unwrap();
    let one = contents.find("Chapter One").unwrap();
    assert!(two < toc && toc < one);
}

#[test]
fn test_separate_toc_order() {
    let (_dir, mut options) = setup();
    options.toc_order = Some(OrderSpec::new(vec![1]));
    run(common::book(), &options).unwrap();

    let contents = read(&options, "Contents.html");
    let one = contents.find("Chapter One").unwrap();
    let toc = contents.find(">Table of Contents<").unwrap();
    assert!(one < toc);
    // The spine keeps its natural order.
    assert!(read(&options, "ch1.html").contains(r#"<a href="Contents.html" class="next"><img src="/images/actions/go-next-button2.png" title="Previous page">"#));
}

#[test]
fn test_order_out_of_range() {
    let (_dir, mut options) = setup();
    options.spine_order = OrderSpec::new(vec![3]);
    match run(common::book(), &options) {
        Err(Error::OrderOutOfRange { index, max }) => {
            assert_eq!(index, 3);
            assert_eq!(max, 2);
        }
        other => panic!("expected an out of range error, got {other:?}"),
    }
    assert!(!options.output_dir.exists());
}

#[test]
fn test_no_overwrite_guard() {
    let (_dir, mut options) = setup();
    options.common.overwrite = false;
    fs::create_dir_all(&options.output_dir).unwrap();
    fs::write(options.output_dir.join("ch1.html"), "keep").unwrap();

    let summary = run(common::book(), &options).unwrap();

    assert_eq!(read(&options, "ch1.html"), "keep");
    assert_eq!(summary.processed, 6);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.written, 5);
}

#[test]
fn test_dry_run_writes_nothing() {
    let (_dir, mut options) = setup();
    options.common.dry_run = true;
    let summary = run(common::book(), &options).unwrap();

    assert_eq!(summary.processed, 6);
    assert_eq!(summary.written, 0);
    assert!(!options.output_dir.exists());
}

#[test]
fn test_missing_toc_reference() {
    let (_dir, options) = setup();
    let opf = common::OPF.replace(r#"<spine toc="ncx">"#, "<spine>");
    assert!(matches!(
        run(common::book_with_opf(&opf), &options),
        Err(Error::InvalidEpub(_))
    ));
}

#[test]
fn test_missing_template() {
    let (dir, mut options) = setup();
    options.template = Some(dir.path().join("nowhere.html"));
    assert!(matches!(run(common::book(), &options), Err(Error::Config(_))));
}
