use chat_relay_core::{ConversationHistory, Role};

const PAGE_HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Chat</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
#log { list-style: none; padding: 0; }
#log li { white-space: pre-wrap; margin: 0.5rem 0; padding: 0.5rem 0.75rem; border-radius: 0.5rem; }
#log li.user { background: #e8f0fe; }
#log li.model { background: #f1f3f4; }
#log li.error { background: #fce8e6; }
form { display: flex; gap: 0.5rem; }
#message { flex: 1; padding: 0.5rem; }
</style>
</head>
<body>
<h1>Chat</h1>
<ul id="log">
"#;

const PAGE_TAIL: &str = r#"</ul>
<form id="chat-form">
<input id="message" name="message" autocomplete="off" placeholder="Type a message" autofocus>
<button type="submit">Send</button>
<button type="button" id="reset">Reset</button>
</form>
<script>
const log = document.getElementById("log");
const input = document.getElementById("message");
function add(role, text) {
  const li = document.createElement("li");
  li.className = role;
  li.textContent = text;
  log.appendChild(li);
  li.scrollIntoView();
}
document.getElementById("chat-form").addEventListener("submit", async (event) => {
  event.preventDefault();
  const message = input.value.trim();
  if (!message) return;
  input.value = "";
  add("user", message);
  try {
    const resp = await fetch("/chat", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ message }),
    });
    const data = await resp.json();
    if (resp.ok) add("model", data.reply); else add("error", data.error || resp.statusText);
  } catch (err) {
    add("error", String(err));
  }
});
document.getElementById("reset").addEventListener("click", async () => {
  await fetch("/reset", { method: "POST" });
  log.innerHTML = "";
});
</script>
</body>
</html>
"#;

/// Full chat page with the stored conversation pre-rendered
pub fn render_page(history: &ConversationHistory) -> String {
    let mut html = String::from(PAGE_HEAD);
    for turn in history.turns() {
        let class = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        html.push_str(&format!(
            "<li class=\"{}\">{}</li>\n",
            class,
            escape_html(&turn.text)
        ));
    }
    html.push_str(PAGE_TAIL);
    html
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
