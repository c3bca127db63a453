pub enum Banner<'a> {
    Success(&'a str),
    Error(&'a str),
}

pub fn setup_page(banner: Option<Banner<'_>>) -> String {
    let banner = match banner {
        Some(Banner::Success(message)) => {
            format!(r#"<p class="ok">✅ {}</p>"#, escape_html(message))
        }
        Some(Banner::Error(message)) => {
            format!(r#"<p class="err">❌ {}</p>"#, escape_html(message))
        }
        None => String::new(),
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <title>Configure GEMINI_API_KEY</title>
  <style>
    body{{font-family:system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial,sans-serif;padding:24px;max-width:640px;margin:auto}}
    input,button{{font-size:16px;padding:10px}} input{{width:100%;margin:8px 0}}
    .ok{{color:#0a0}} .err{{color:#b00}}
    code{{background:#f7f7f7;padding:2px 6px;border-radius:4px}}
  </style>
</head>
<body>
  <h1>🔑 Configure GEMINI_API_KEY</h1>
  {banner}
  <p>The key is kept in memory only, until the next restart.</p>
  <form method="post" action="/setup">
    <label for="key">Your GEMINI_API_KEY (starts with <code>AIza</code>)</label>
    <input id="key" name="key" placeholder="AIza..." autocomplete="off" required/>
    <button type="submit">Save and start the relay</button>
  </form>
  <p>Once saved, watch the service logs and scan the QR code from WhatsApp &gt; Linked devices.</p>
  <p>You can also set the <code>GEMINI_API_KEY</code> environment variable. Healthcheck: <code>/ping</code></p>
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
