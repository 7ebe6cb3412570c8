/// Wrap page content in a minimal HTML shell. Hand-built via small
/// `format!` helpers rather than pulling in a templating engine for a
/// deliberately bare UI.
pub fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} — Outpost</title>
<style>
*{{margin:0;padding:0;box-sizing:border-box;}}
body{{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;background:#fafafa;}}
.header{{background:#1a1a1a;color:#fff;padding:12px 24px;}}
.header h1{{font-size:18px;font-weight:600;}}
.container{{max-width:860px;margin:0 auto;padding:24px;}}
.badge{{display:inline-block;padding:2px 8px;border-radius:12px;font-size:11px;font-weight:600;text-transform:uppercase;}}
.badge-pending{{background:#fff3e0;color:#e65100;}}
.badge-running{{background:#e3f2fd;color:#1565c0;}}
.badge-completed{{background:#e8f5e9;color:#2e7d32;}}
.badge-failed{{background:#fce4ec;color:#c62828;}}
pre{{background:#fff;border:1px solid #e0e0e0;border-radius:8px;padding:16px;overflow-x:auto;font-size:12px;}}
</style>
</head>
<body>
<div class="header"><h1>Outpost</h1></div>
<div class="container">
{content}
</div>
</body>
</html>"#,
        title = html_escape(title),
    )
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
