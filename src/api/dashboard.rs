use html_escape::encode_text;

use crate::types::FactoryConfig;

/// Minimal live dashboard: current director config plus a feed of stream
/// updates.
pub fn render_dashboard(config: &FactoryConfig) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Crew dashboard</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
#feed li {{ margin-bottom: .5rem; }}
.error {{ color: #b00020; }}
.complete {{ color: #1b5e20; }}
</style>
</head>
<body>
<h1>Crew dashboard</h1>
<section>
<h2>Factory Director</h2>
<p><strong>Goal:</strong> <span id="goal">{goal}</span></p>
<p><strong>Backstory:</strong> <span id="backstory">{backstory}</span></p>
<button id="restart">Restart crew</button>
</section>
<h2>Updates</h2>
<ul id="feed"></ul>
<script>
const feed = document.getElementById("feed");
const source = new EventSource("/stream");
source.onmessage = (event) => {{
  const update = JSON.parse(event.data);
  const item = document.createElement("li");
  item.className = update.type;
  const who = update.agent ? update.agent + ": " : "";
  item.textContent = "[" + update.timestamp + "] " + update.type + " " + who + update.message;
  feed.prepend(item);
}};
document.getElementById("restart").onclick = () => fetch("/restart_crew", {{ method: "POST" }});
</script>
</body>
</html>
"#,
        goal = encode_text(config.goal()),
        backstory = encode_text(config.backstory()),
    )
}
