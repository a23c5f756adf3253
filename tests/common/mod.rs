//! A small EPUB built in memory, shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

pub const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

pub const OPF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf" version="2.0">
  <metadata>
    <dc:title>Test Book</dc:title>
    <dc:creator opf:role="aut">Ann Author</dc:creator>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="ch1" href="Text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="Text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="Styles/main.css" media-type="text/css"/>
    <item id="cover" href="Images/cover.png" media-type="image/png"/>
    <item id="font" href="Fonts/a.ttf" media-type="font/ttf"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

pub const NCX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="n1" playOrder="1">
      <navLabel><text>Chapter One</text></navLabel>
      <content src="Text/ch1.xhtml"/>
    </navPoint>
    <navPoint id="n2" playOrder="2">
      <navLabel><text>Chapter Two</text></navLabel>
      <content src="Text/ch2.xhtml#start"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub const CH1: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Old title</title><link rel="stylesheet" type="text/css" href="../Styles/main.css"/></head>
<body>
<h1>One</h1>
<p><a href="ch2.xhtml#start">next</a> <img src="../Images/cover.png" alt="cover"/> See MN 10.</p>
</body>
</html>"#;

pub const CH2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Two</title></head>
<body><p id="start">Two</p></body>
</html>"#;

pub const CSS: &str = "body { background: url(../Images/cover.png) no-repeat; }\n";

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

pub const TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"></head>
<body><header>{{ meta_title }}</header><div id="content"></div></body></html>"#;

pub fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn book_with_opf(opf: &str) -> Vec<u8> {
    build_zip(&[
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", CONTAINER.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/toc.ncx", NCX.as_bytes()),
        ("OEBPS/Text/ch1.xhtml", CH1.as_bytes()),
        ("OEBPS/Text/ch2.xhtml", CH2.as_bytes()),
        ("OEBPS/Styles/main.css", CSS.as_bytes()),
        ("OEBPS/Images/cover.png", PNG),
        ("OEBPS/Fonts/a.ttf", b"font"),
    ])
}

pub fn book() -> Vec<u8> {
    book_with_opf(OPF)
}
