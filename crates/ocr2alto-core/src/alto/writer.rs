//! Streaming ALTO v3 serialization with `quick-xml`.

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use super::geometry::{PageSize, PixelBox, Space, format_confidence, word_confidence};
use crate::error::AltoError;
use crate::ocr::{Block, OcrDocument};

const ALTO_NAMESPACE: &str = "http://www.loc.gov/standards/alto/ns-v3#";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://www.loc.gov/standards/alto/ns-v3# http://www.loc.gov/alto/v3/alto-3-0.xsd";

type XmlResult<T> = std::result::Result<T, AltoError>;

fn xml_error(e: impl std::fmt::Display) -> AltoError {
    AltoError::Xml(e.to_string())
}

fn with_box<'a>(mut element: BytesStart<'a>, pixels: &PixelBox) -> BytesStart<'a> {
    element.push_attribute(("HPOS", pixels.hpos.to_string().as_str()));
    element.push_attribute(("VPOS", pixels.vpos.to_string().as_str()));
    element.push_attribute(("WIDTH", pixels.width.to_string().as_str()));
    element.push_attribute(("HEIGHT", pixels.height.to_string().as_str()));
    element
}

/// Writes one ALTO document page by page.
///
/// Line and String counters run across the whole document, so ids stay
/// unique when a folder holds several pages.
pub struct AltoWriter<W: Write> {
    xml: Writer<W>,
    next_line: usize,
    next_string: usize,
    pages: usize,
}

impl<W: Write> AltoWriter<W> {
    /// Write the header and description, leaving `Layout` open.
    pub fn start(out: W, software_name: &str) -> XmlResult<Self> {
        let mut xml = Writer::new_with_indent(out, b' ', 2);

        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;

        let mut root = BytesStart::new("alto");
        root.push_attribute(("xmlns", ALTO_NAMESPACE));
        root.push_attribute(("xmlns:xlink", XLINK_NAMESPACE));
        root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
        xml.write_event(Event::Start(root)).map_err(xml_error)?;

        let mut writer = Self {
            xml,
            next_line: 0,
            next_string: 0,
            pages: 0,
        };
        writer.description(software_name)?;
        writer.open("Layout")?;
        Ok(writer)
    }

    fn description(&mut self, software_name: &str) -> XmlResult<()> {
        self.open("Description")?;
        self.text_element("MeasurementUnit", "pixel")?;
        self.empty(BytesStart::new("sourceImageInformation"))?;

        let mut processing = BytesStart::new("OCRProcessing");
        processing.push_attribute(("ID", "OCR_0"));
        self.event(Event::Start(processing))?;
        self.open("ocrProcessingStep")?;
        self.open("processingSoftware")?;
        self.text_element("softwareName", software_name)?;
        self.close("processingSoftware")?;
        self.close("ocrProcessingStep")?;
        self.close("OCRProcessing")?;

        self.close("Description")
    }

    /// Append one `Page` holding every LINE of `document`.
    pub fn write_page(&mut self, id: &str, size: PageSize, document: &OcrDocument) -> XmlResult<()> {
        self.pages += 1;

        let mut page = BytesStart::new("Page");
        page.push_attribute(("ID", id));
        page.push_attribute(("PHYSICAL_IMG_NR", self.pages.to_string().as_str()));
        page.push_attribute(("WIDTH", size.width.to_string().as_str()));
        page.push_attribute(("HEIGHT", size.height.to_string().as_str()));
        self.event(Event::Start(page))?;

        self.event(Event::Start(with_box(
            BytesStart::new("PrintSpace"),
            &PixelBox::page(size),
        )))?;

        let index = document.index();
        for line in document.lines() {
            let words: Vec<Option<&Block>> = line
                .child_ids()
                .map(|word_id| {
                    let word = index.get(word_id).copied();
                    if word.is_none() {
                        debug!("Page {}: line {} refers to unknown word {}", id, line.id, word_id);
                    }
                    word
                })
                .collect();
            self.write_line(line, &words, size)?;
        }

        self.close("PrintSpace")?;
        self.close("Page")
    }

    /// `words` keeps unresolved ids as `None`: they emit nothing, and no SP
    /// is placed across them.
    fn write_line(&mut self, line: &Block, words: &[Option<&Block>], size: PageSize) -> XmlResult<()> {
        let n = self.next_line;
        self.next_line += 1;
        let pixels = PixelBox::from_normalized(line.bbox(), size);

        for (name, id) in [
            ("ComposedBlock", format!("cblock_{}", n)),
            ("TextBlock", format!("block_{}", n)),
            ("TextLine", format!("line_{}", n)),
        ] {
            let mut element = BytesStart::new(name);
            element.push_attribute(("ID", id.as_str()));
            self.event(Event::Start(with_box(element, &pixels)))?;
        }

        for (i, word) in words.iter().enumerate() {
            let Some(word) = word else { continue };
            self.write_string(word, size)?;
            if let Some(Some(next)) = words.get(i + 1) {
                let space = Space::between(word.bbox(), next.bbox(), size);
                let mut sp = BytesStart::new("SP");
                sp.push_attribute(("WIDTH", space.width.to_string().as_str()));
                sp.push_attribute(("VPOS", space.vpos.to_string().as_str()));
                sp.push_attribute(("HPOS", space.hpos.to_string().as_str()));
                self.empty(sp)?;
            }
        }

        self.close("TextLine")?;
        self.close("TextBlock")?;
        self.close("ComposedBlock")
    }

    fn write_string(&mut self, word: &Block, size: PageSize) -> XmlResult<()> {
        let id = format!("string_{}", self.next_string);
        self.next_string += 1;

        let mut string = BytesStart::new("String");
        string.push_attribute(("ID", id.as_str()));
        let mut string = with_box(string, &PixelBox::from_normalized(word.bbox(), size));
        string.push_attribute(("CONTENT", word.text()));
        string.push_attribute(("WC", format_confidence(word_confidence(word.confidence)).as_str()));
        self.empty(string)
    }

    /// Close the document and hand back the underlying writer.
    pub fn finish(mut self) -> XmlResult<W> {
        self.close("Layout")?;
        self.close("alto")?;
        Ok(self.xml.into_inner())
    }

    fn event(&mut self, event: Event<'_>) -> XmlResult<()> {
        self.xml.write_event(event).map_err(xml_error)
    }

    fn open(&mut self, name: &str) -> XmlResult<()> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> XmlResult<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, element: BytesStart<'_>) -> XmlResult<()> {
        self.event(Event::Empty(element))
    }

    fn text_element(&mut self, name: &str, text: &str) -> XmlResult<()> {
        self.open(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }
}
