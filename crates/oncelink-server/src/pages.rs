//! HTML for the viewer and the expired state.
//!
//! Every "no longer available" case renders the same page so callers cannot
//! tell an unknown token from a consumed or timed-out one.

use oncelink_core::{MediaRef, Token};

/// The viewer retries a failed finalize with a growing delay before giving up.
const FINALIZE_ATTEMPTS: u32 = 3;

pub fn viewer_page(media_ref: &MediaRef, token: &Token, view_seconds: u32) -> String {
    let src = escape_html(media_ref.as_str());
    // Token の文字種は URL セーフなので JS 文字列にそのまま埋め込める
    // expire は /view/<token> からの相対パス（BASE_URL のパス接頭辞を保つ）
    let token = token.as_str();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<meta name="referrer" content="no-referrer">
<title>Secure View</title>
<style>
  body {{ margin:0; background:#000; color:#fff; font-family:Arial, sans-serif;
         display:flex; align-items:center; justify-content:center; height:100vh; overflow:hidden; }}
  .container {{ position:relative; max-width:90%; width:400px; }}
  img {{ width:100%; border-radius:10px; display:block; }}
  .countdown {{ position:absolute; top:10px; right:10px; background:rgba(0,0,0,0.6);
               padding:8px 12px; border-radius:8px; font-size:18px; font-weight:bold; color:#ff4d4d; }}
</style>
</head>
<body>
  <div class="container">
    <img id="media" src="{src}" alt="">
    <div class="countdown" id="count">{view_seconds}</div>
  </div>
<script>
  const img = document.getElementById("media");
  const countEl = document.getElementById("count");
  let time = {view_seconds};
  const finalize = (attempt) => {{
    fetch("../expire/{token}", {{ method: "POST" }})
      .then((res) => {{
        if (!res.ok) throw new Error(res.status);
        document.body.innerHTML = "<h2 style='color:#ff4d4d'>Link Expired</h2>";
      }})
      .catch(() => {{
        if (attempt < {FINALIZE_ATTEMPTS}) {{
          setTimeout(() => finalize(attempt + 1), attempt * 1000);
        }} else {{
          countEl.innerText = "!";
        }}
      }});
  }};
  img.onload = () => {{
    const timer = setInterval(() => {{
      time--;
      countEl.innerText = time;
      if (time <= 0) {{
        clearInterval(timer);
        finalize(1);
      }}
    }}, 1000);
  }};
</script>
</body>
</html>
"#
    )
}

pub fn expired_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Link Expired</title>
<style>
  body { margin:0; background:#000; color:#ff4d4d; font-family:Arial, sans-serif;
         display:flex; flex-direction:column; align-items:center; justify-content:center; height:100vh; }
</style>
</head>
<body>
  <h2>Link Expired</h2>
  <p>This media was designed to be viewed only once.</p>
</body>
</html>
"#
    .to_string()
}

pub fn unavailable_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Unavailable</title></head>
<body style="background:#000;color:#fff;font-family:Arial, sans-serif;text-align:center;padding-top:40vh">
  <h2>Temporarily unavailable</h2>
  <p>Please try again in a moment.</p>
</body>
</html>
"#
    .to_string()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
