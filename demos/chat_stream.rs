use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use inkline::{
    FontSystem, LabelConfig, RichLabel,
    fontdb::{self, Family, Query},
    image::{Rgba, RgbaImage},
    renderer::Canvas,
    text::{Color, ImageSource, StyledBuffer, TextStyle},
};

const CHUNKS: &[&str] = &[
    "Sure! ",
    "Here is a short answer ",
    "with an inline chart ",
    "right in the middle of the text. ",
    "Streaming keeps appending words ",
    "while the layout runs on a worker thread.\n",
    "Each snapshot is published in order, ",
    "so the monitor below sees every length.\n",
    "Done.",
];

fn pick_font(fonts: &FontSystem) -> fontdb::ID {
    fonts.load_system_fonts();
    assert!(!fonts.is_empty(), "system fonts are required for this demo");

    const FAMILIES: &[Family<'_>] = &[Family::SansSerif];
    let query = Query {
        families: FAMILIES,
        weight: fontdb::Weight::NORMAL,
        stretch: fontdb::Stretch::Normal,
        style: fontdb::Style::Normal,
    };

    fonts
        .query(&query)
        .or_else(|| fonts.first_face())
        .expect("no usable fonts registered in FontSystem")
}

/// A small bar chart to embed in the transcript.
fn chart() -> ImageSource {
    let mut pixels = RgbaImage::from_pixel(96, 48, Rgba([240, 240, 245, 255]));
    for (i, height) in [12u32, 30, 22, 40, 18].into_iter().enumerate() {
        let left = 6 + i as u32 * 18;
        for x in left..left + 12 {
            for y in 48 - height..46 {
                pixels.put_pixel(x, y, Rgba([60, 120, 200, 255]));
            }
        }
    }
    ImageSource::from_rgba(pixels)
}

#[allow(clippy::unwrap_used)]
fn main() {
    let fonts = Arc::new(FontSystem::new());
    let font_id = pick_font(&fonts);

    let config = LabelConfig {
        background: Color::WHITE,
        ..LabelConfig::default()
    };
    let mut label = RichLabel::new(fonts, config).unwrap();
    label.resize(360.0);

    let user = TextStyle::new(font_id, 15.0)
        .with_color(Color::DARK_GRAY)
        .with_spacing(3.0, 6.0);
    let assistant = TextStyle::new(font_id, 14.0).with_spacing(3.0, 6.0);

    let mut prompt = StyledBuffer::new();
    prompt.push_text("Can you summarize the numbers?\n\n", user);
    label.set_content(prompt.clone());

    // The producer appends growing snapshots, the way a streaming reply does.
    let appender = label.appender();
    let producer = thread::spawn(move || {
        let mut transcript = prompt;
        for (i, chunk) in CHUNKS.iter().enumerate() {
            transcript.push_text(*chunk, assistant);
            if i == 2 {
                transcript.push_image(chart(), None);
                transcript.push_text(" ", assistant);
            }
            let len = transcript.len();
            appender.append_content(transcript.clone(), move |size| {
                println!(
                    "published {len:4} units -> {:.0}x{:.0}",
                    size.width, size.height
                );
            });
            thread::sleep(Duration::from_millis(80));
        }
    });

    let timer = Instant::now();
    while !producer.is_finished() || !label.is_idle() {
        label.pump_timeout(Duration::from_millis(16)).unwrap();
    }
    producer.join().unwrap();

    let state = label.render_state();
    println!(
        "Final content: {} units, {:?}, {} lines, {} images (elapsed: {:.2?})",
        state.content_len(),
        state.size(),
        state.layout().map_or(0, |layout| layout.line_count()),
        state.placements().len(),
        timer.elapsed()
    );

    let mut canvas = Canvas::for_size(label.current_content_size());
    label.draw(&mut canvas);

    std::fs::create_dir_all("debug").expect("failed to create debug directory");
    canvas
        .image()
        .save("debug/chat_stream.png")
        .expect("failed to save debug image");

    println!("Saved debug image to debug/chat_stream.png");
}
