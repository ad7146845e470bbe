#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Assembles complete PDFs for the integration suites: indirect objects
/// with tracked byte offsets, then an xref section, trailer, and
/// `startxref`.
pub struct PdfBuilder {
    buf: Vec<u8>,
    offsets: BTreeMap<u32, usize>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n");
        PdfBuilder {
            buf,
            offsets: BTreeMap::new(),
        }
    }

    /// Write an indirect object with an inline body.
    pub fn object(&mut self, num: u32, body: &str) -> &mut Self {
        self.offsets.insert(num, self.buf.len());
        self.buf
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
        self
    }

    /// Write a stream object whose payload is flate-compressed.
    /// `extra_dict` supplies everything but `/Filter` and `/Length`.
    pub fn stream_object(&mut self, num: u32, extra_dict: &str, data: &[u8]) -> &mut Self {
        let compressed = deflate(data);
        self.offsets.insert(num, self.buf.len());
        self.buf.extend_from_slice(
            format!(
                "{} 0 obj\n<<{} /Filter /FlateDecode /Length {}>>\nstream\n",
                num,
                extra_dict,
                compressed.len()
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(&compressed);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        self
    }

    /// Byte offset of a previously written object.
    pub fn offset_of(&self, num: u32) -> usize {
        self.offsets[&num]
    }

    /// Finish with a legacy xref table (one subsection covering object 0
    /// through the highest number written) and a trailer.
    pub fn finish(self, root: u32) -> Vec<u8> {
        self.finish_with_trailer(root, "")
    }

    /// Like [`finish`], appending raw entries (e.g. `" /Info 9 0 R"` or
    /// `" /XRefStm 1234"`) to the trailer dictionary.
    pub fn finish_with_trailer(mut self, root: u32, trailer_extra: &str) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let size = self.offsets.keys().next_back().map_or(1, |&n| n + 1);

        self.buf
            .extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        self.buf.extend_from_slice(b"0000000000 65535 f \n");
        for num in 1..size {
            match self.offsets.get(&num) {
                Some(&off) => self
                    .buf
                    .extend_from_slice(format!("{:010} {:05} n \n", off, 0).as_bytes()),
                None => self.buf.extend_from_slice(b"0000000000 00000 f \n"),
            }
        }

        self.buf.extend_from_slice(
            format!(
                "trailer\n<</Size {} /Root {} 0 R{}>>\nstartxref\n{}\n%%EOF\n",
                size, root, trailer_extra, xref_offset
            )
            .as_bytes(),
        );
        self.buf
    }

    /// Finish with a cross-reference stream instead of a table. Objects
    /// written so far become type-1 entries; `compressed` lists
    /// `(object, container)` pairs recorded as type-2 entries.
    pub fn finish_with_xref_stream(mut self, root: u32, compressed: &[(u32, u32)]) -> Vec<u8> {
        let xref_offset = self.buf.len();

        let mut entries: BTreeMap<u32, (u8, u32)> = BTreeMap::new();
        for (&num, &off) in &self.offsets {
            entries.insert(num, (1, off as u32));
        }
        for &(num, container) in compressed {
            entries.insert(num, (2, container));
        }
        let stream_num = entries.keys().next_back().map_or(1, |&n| n + 1);
        entries.insert(stream_num, (1, xref_offset as u32));
        let size = stream_num + 1;

        // W [1 4 1]: one type byte, four big-endian location bytes, one
        // generation/index byte. Gaps become type-0 (free) records.
        let mut records = Vec::new();
        for num in 0..size {
            let (kind, loc) = entries.get(&num).copied().unwrap_or((0, 0));
            records.push(kind);
            records.extend_from_slice(&loc.to_be_bytes());
            records.push(0);
        }
        let payload = deflate(&records);

        self.buf.extend_from_slice(
            format!(
                "{} 0 obj\n<</Type /XRef /W [1 4 1] /Size {} /Root {} 0 R /Filter /FlateDecode /Length {}>>\nstream\n",
                stream_num,
                size,
                root,
                payload.len()
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(&payload);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        self.buf.extend_from_slice(
            format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes(),
        );
        self.buf
    }
}

/// Append an incremental update redefining `objects`, with an xref table
/// chained to the base file's section via `/Prev`.
pub fn append_update(base: Vec<u8>, objects: &[(u32, &str)], root: u32, size: u32) -> Vec<u8> {
    let prev = last_startxref(&base);
    let mut buf = base;

    let mut offsets = Vec::new();
    for &(num, body) in objects {
        offsets.push((num, buf.len()));
        buf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
    }

    let xref_offset = buf.len();
    buf.extend_from_slice(b"xref\n");
    for &(num, off) in &offsets {
        buf.extend_from_slice(format!("{} 1\n", num).as_bytes());
        buf.extend_from_slice(format!("{:010} {:05} n \n", off, 0).as_bytes());
    }
    buf.extend_from_slice(
        format!(
            "trailer\n<</Size {} /Root {} 0 R /Prev {}>>\nstartxref\n{}\n%%EOF\n",
            size, root, prev, xref_offset
        )
        .as_bytes(),
    );
    buf
}

/// The startxref offset recorded at the end of `data`.
fn last_startxref(data: &[u8]) -> usize {
    let text = String::from_utf8_lossy(data);
    let mut lines = text.trim_end().lines().rev();
    lines.next(); // %%EOF
    lines
        .next()
        .and_then(|line| line.trim().parse().ok())
        .expect("base file has no startxref tail")
}

/// Pack object-stream members into `(first_offset, payload)` form: the
/// `id offset` header pairs, then the bodies.
pub fn object_stream_data(members: &[(u32, &str)]) -> (usize, Vec<u8>) {
    let mut header = String::new();
    let mut bodies = String::new();
    for &(num, body) in members {
        header.push_str(&format!("{} {} ", num, bodies.len()));
        bodies.push_str(body);
        bodies.push('\n');
    }
    let first = header.len();
    let mut data = header.into_bytes();
    data.extend_from_slice(bodies.as_bytes());
    (first, data)
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// A complete tagged single-page document: one `/P` element whose only
/// kid is MCID 0, a content stream showing `(Hello)`, one font without a
/// `/ToUnicode` map.
pub fn single_paragraph_pdf() -> Vec<u8> {
    let mut b = PdfBuilder::new();
    b.object(1, "<</Type /Catalog /Pages 2 0 R /StructTreeRoot 6 0 R>>");
    b.object(2, "<</Type /Pages /Count 1 /Kids [3 0 R]>>");
    b.object(
        3,
        "<</Type /Page /Parent 2 0 R /Resources <</Font <</F1 5 0 R>>>> /Contents 4 0 R>>",
    );
    b.stream_object(
        4,
        "",
        b"/P <</MCID 0>> BDC\nBT\n/F1 12 Tf\n[(Hello)] TJ\nET\nEMC\n",
    );
    b.object(5, "<</Type /Font /Subtype /TrueType /BaseFont /Helvetica>>");
    b.object(6, "<</Type /StructTreeRoot /K [7 0 R]>>");
    b.object(7, "<</Type /StructElem /S /P /Pg 3 0 R /K 0>>");
    b.finish(1)
}
