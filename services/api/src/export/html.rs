//! services/api/src/export/html.rs
//!
//! Renders the finished book as a single interactive HTML document:
//! inline styles, script-driven page navigation, per-page play/pause when
//! narration exists, and keyboard shortcuts (arrow keys, space).

use storybook_core::domain::StoryPage;

/// Where the audio elements point. `Inline` embeds each clip as a data URI
/// so the document is fully self-contained (the publish path); `Relative`
/// references `audio/page-N.mp3` for the zip bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    Inline,
    Relative,
}

pub fn render(title: &str, pages: &[StoryPage], audio: AudioSource) -> String {
    let mut sections = String::new();
    for (i, page) in pages.iter().enumerate() {
        let hidden = if i == 0 { "" } else { " hidden" };
        sections.push_str(&format!(
            "    <section class=\"page\" id=\"page-{}\"{}>\n",
            i, hidden
        ));
        if let Some(image) = &page.illustration {
            sections.push_str(&format!(
                "      <img src=\"{}\" alt=\"Illustration for page {}\">\n",
                image.to_data_uri(),
                page.page
            ));
        }
        sections.push_str(&format!("      <p>{}</p>\n", escape_html(&page.text)));
        if let Some(clip) = &page.narration {
            let src = match audio {
                AudioSource::Inline => format!(
                    "data:{};base64,{}",
                    clip.mime_type,
                    base64_encode(&clip.data)
                ),
                AudioSource::Relative => super::audio_file_name(page.page),
            };
            sections.push_str(&format!(
                "      <audio id=\"audio-{}\" src=\"{}\" preload=\"auto\"></audio>\n",
                i, src
            ));
        }
        sections.push_str("    </section>\n");
    }

    let escaped_title = escape_html(title);
    let page_count = pages.len();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{escaped_title}</title>
  <style>
    body {{ font-family: Georgia, serif; background: #fdf6ec; color: #333; margin: 0; }}
    main {{ max-width: 720px; margin: 0 auto; padding: 2rem 1rem; }}
    h1 {{ text-align: center; color: #e11d48; }}
    .page img {{ width: 100%; border-radius: 12px; box-shadow: 0 4px 12px rgba(0,0,0,0.15); }}
    .page p {{ font-size: 1.4rem; line-height: 1.6; }}
    .page[hidden] {{ display: none; }}
    nav {{ display: flex; justify-content: space-between; align-items: center; margin-top: 1rem; }}
    nav button {{ font-size: 1rem; padding: 0.5rem 1.25rem; border-radius: 999px; border: none;
                  background: #e11d48; color: white; cursor: pointer; }}
    nav button:disabled {{ background: #ccc; cursor: default; }}
  </style>
</head>
<body>
  <main>
    <h1>{escaped_title}</h1>
{sections}    <nav>
      <button id="prev">Previous</button>
      <span id="counter"></span>
      <button id="play">Play</button>
      <button id="next">Next</button>
    </nav>
  </main>
  <script>
    const total = {page_count};
    let current = 0;
    function audioFor(i) {{ return document.getElementById('audio-' + i); }}
    function show(i) {{
      const playing = audioFor(current);
      if (playing) {{ playing.pause(); playing.currentTime = 0; }}
      document.getElementById('page-' + current).hidden = true;
      current = i;
      document.getElementById('page-' + current).hidden = false;
      document.getElementById('counter').textContent = 'Page ' + (current + 1) + ' of ' + total;
      document.getElementById('prev').disabled = current === 0;
      document.getElementById('next').disabled = current === total - 1;
      document.getElementById('play').hidden = !audioFor(current);
    }}
    function prev() {{ if (current > 0) show(current - 1); }}
    function next() {{ if (current < total - 1) show(current + 1); }}
    function toggleAudio() {{
      const audio = audioFor(current);
      if (!audio) return;
      if (audio.paused) {{ audio.play(); }} else {{ audio.pause(); }}
    }}
    document.getElementById('prev').addEventListener('click', prev);
    document.getElementById('next').addEventListener('click', next);
    document.getElementById('play').addEventListener('click', toggleAudio);
    document.addEventListener('keydown', (e) => {{
      if (e.key === 'ArrowLeft') prev();
      else if (e.key === 'ArrowRight') next();
      else if (e.key === ' ') {{ e.preventDefault(); toggleAudio(); }}
    }});
    show(0);
  </script>
</body>
</html>
"#
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn base64_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    BASE64.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storybook_core::domain::{AudioClip, StoredImage};

    fn narrated_page(number: u32, text: &str) -> StoryPage {
        let mut page = StoryPage::new(number, text);
        page.illustration = Some(StoredImage::new(vec![1, 2, 3], "image/png"));
        page.narration = Some(AudioClip::mpeg(vec![9, 9]));
        page
    }

    #[test]
    fn inline_export_embeds_audio_as_data_uris() {
        let html = render("My Story", &[narrated_page(1, "hello")], AudioSource::Inline);
        assert!(html.contains("data:audio/mpeg;base64,"));
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("<title>My Story</title>"));
    }

    #[test]
    fn relative_export_references_bundled_audio_files() {
        let html = render("My Story", &[narrated_page(3, "hi")], AudioSource::Relative);
        assert!(html.contains("src=\"audio/page-3.mp3\""));
        assert!(!html.contains("data:audio/mpeg"));
    }

    #[test]
    fn page_text_and_title_are_escaped() {
        let page = StoryPage::new(1, "Tom & Jerry <script>");
        let html = render("A <b>Title</b>", &[page], AudioSource::Inline);
        assert!(html.contains("Tom &amp; Jerry &lt;script&gt;"));
        assert!(html.contains("<title>A &lt;b&gt;Title&lt;/b&gt;</title>"));
        assert!(!html.contains("<script>Tom"));
    }

    #[test]
    fn only_the_first_page_is_visible_initially() {
        let pages = vec![StoryPage::new(1, "one"), StoryPage::new(2, "two")];
        let html = render("T", &pages, AudioSource::Inline);
        assert!(html.contains("id=\"page-0\">"));
        assert!(html.contains("id=\"page-1\" hidden>"));
    }

    #[test]
    fn navigation_script_handles_keyboard_shortcuts() {
        let html = render("T", &[StoryPage::new(1, "one")], AudioSource::Inline);
        assert!(html.contains("ArrowLeft"));
        assert!(html.contains("ArrowRight"));
        assert!(html.contains("toggleAudio"));
    }
}
