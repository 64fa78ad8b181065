use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::present::{
    age_on, date_of_birth, days_until_birthday, listening_card, uk_date, uk_time, ListeningCard,
};
use crate::snapshot::StatusSnapshot;

/// Everything the page needs besides the snapshot.
pub struct PageContext<'a> {
    pub now: DateTime<Utc>,
    pub turnstile_site_key: &'a str,
}

const SKILLS: [&str; 13] = [
    "Adobe",
    "Arduino",
    "Discord",
    "GitHub",
    "JavaScript",
    "Python",
    "React",
    "Shopify",
    "Spotify",
    "Tailwind CSS",
    "VS Code",
    "WordPress",
    "Git",
];

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encode the bytes that could end a quoted CSS `url(...)` or the
/// attribute it sits in.
fn css_url(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\'' | '"' | '(' | ')' | '\\' | '<' | '>' => {
                out.push_str(&format!("%{:02X}", c as u32));
            }
            c if c.is_whitespace() || c.is_control() => {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{b:02X}"));
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// The listening card as the browser swaps it in: attribute values are raw,
/// `inner_html` is already escaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedCard {
    pub href: String,
    pub style: String,
    pub inner_html: String,
}

pub fn render_card(card: &ListeningCard) -> RenderedCard {
    match card {
        ListeningCard::Track {
            text,
            url,
            artwork_url,
        } => RenderedCard {
            href: url.clone(),
            style: format!("background-image:url('{}')", css_url(artwork_url)),
            inner_html: format!(
                r#"<span class="pulse"></span> <span id="listening-text">{}</span>."#,
                escape_html(text)
            ),
        },
        ListeningCard::Playlist { url, artwork_url } => RenderedCard {
            href: url.to_string(),
            style: format!("background-image:url('{}')", css_url(artwork_url)),
            inner_html: concat!(
                r#"<span id="listening-text"><b>playlist:</b> Choons</span>"#,
                "<small>The playlist with my currently favourite songs.</small>"
            )
            .to_string(),
        },
    }
}

fn render_listening(card: &ListeningCard) -> String {
    let card = render_card(card);
    format!(
        r#"<a id="listening" class="card music" href="{href}" target="_blank" rel="noopener noreferrer" style="{style}">{inner}</a>"#,
        href = escape_html(&card.href),
        style = escape_html(&card.style),
        inner = card.inner_html,
    )
}

fn render_skills() -> String {
    SKILLS
        .iter()
        .map(|skill| format!(r#"<li title="{skill}">{skill}</li>"#))
        .collect()
}

pub fn render(snapshot: &StatusSnapshot, ctx: &PageContext<'_>) -> String {
    let dob = date_of_birth();
    let today = uk_date(ctx.now);
    let age = age_on(dob, today);
    let birthday_in = days_until_birthday(dob, today);
    let badge = snapshot.presence.badge();

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Charlie Joiner</title>
<style>{STYLE}</style>
<script src="https://challenges.cloudflare.com/turnstile/v0/api.js" async defer></script>
</head>
<body>
<main>
<section class="card intro">
<h1>Charlie Joiner</h1>
<p>{age} y/o web developer &amp; comp sys eng, next birthday in {birthday_in} days</p>
<p>Based in <span id="location">{location}</span>. I'm actively looking for work, so send me a message below.</p>
</section>
<section class="card clock">
<h2>UK time</h2>
<p id="uk-time">{uk_time}</p>
</section>
<a class="card link" href="https://www.linkedin.com/in/charliejj/" target="_blank" rel="noopener noreferrer">LinkedIn</a>
<a class="card link" href="https://github.com/charliejjoiner" target="_blank" rel="noopener noreferrer">GitHub</a>
<section id="presence" class="card {badge_class}">
<h2>Discord <span id="presence-label">{presence}</span></h2>
<p>@<span id="username">{username}</span></p>
</section>
{listening}
<ul class="card skills">{skills}</ul>
<section class="card about">
<h2>Hello world</h2>
<p>My name is Charlie, a recent graduate of The University of Kent in Computer Systems Engineering. I've been programming for as long as I can remember, from Arduino to RTOS RFID race timing systems, but I enjoy web development the most.</p>
<p>Beyond programming, I'm really interested in photography; you can often catch me spending time out with my camera. Either that or I'll be playing games like Apex Legends &amp; Call of Duty.</p>
</section>
<section class="card contact">
<form id="contact">
<input type="email" name="email" placeholder="you@example.com" required>
<textarea name="message" rows="4" placeholder="Your message" required></textarea>
<div class="cf-turnstile" data-sitekey="{site_key}"></div>
<button type="submit">Send</button>
<p id="contact-result"></p>
</form>
</section>
</main>
<script>{SCRIPT}</script>
</body>
</html>
"#,
        STYLE = STYLE,
        SCRIPT = SCRIPT,
        age = age,
        birthday_in = birthday_in,
        location = escape_html(&snapshot.location),
        badge_class = badge.css_class(),
        presence = snapshot.presence.label(),
        username = escape_html(&snapshot.identity.username),
        listening = render_listening(&listening_card(snapshot)),
        skills = render_skills(),
        uk_time = uk_time(ctx.now),
        site_key = escape_html(ctx.turnstile_site_key),
    )
}

const STYLE: &str = "body{font-family:sans-serif;background:#0b1020;color:#eee}\
main{max-width:48rem;margin:auto;display:grid;grid-template-columns:repeat(2,1fr);gap:1rem;padding:2rem}\
.card{border-radius:1rem;padding:1.5rem;color:inherit;text-decoration:none;background:#1e293b}\
.intro,.about,.contact{grid-column:span 2}\
.skills{list-style:none;margin:0;display:grid;grid-template-columns:repeat(4,1fr);gap:.5rem;font-size:.75rem}\
.music{background-size:cover;background-position:center;display:flex;flex-direction:column;justify-content:end}\
.pulse{display:inline-block;width:.5rem;height:.5rem;border-radius:50%;background:#22c55e}\
.badge-green{background:#16a34a}.badge-orange{background:#fb923c}\
.badge-red{background:#dc2626}.badge-blurple{background:#5865f2}";

const SCRIPT: &str = r#"
(function () {
  var badges = ["badge-green", "badge-orange", "badge-red", "badge-blurple"];
  function apply(ev) {
    var presence = document.getElementById("presence");
    badges.forEach(function (c) { presence.classList.remove(c); });
    presence.classList.add(ev.badge_class);
    document.getElementById("presence-label").textContent = ev.presence_label;
    document.getElementById("username").textContent = ev.snapshot.identity.username;
    document.getElementById("location").textContent = ev.snapshot.location;
    document.getElementById("uk-time").textContent = ev.uk_time;
    var card = document.getElementById("listening");
    card.setAttribute("href", ev.card.href);
    card.setAttribute("style", ev.card.style);
    card.innerHTML = ev.card.inner_html;
  }
  function connect() {
    var proto = location.protocol === "https:" ? "wss://" : "ws://";
    var ws = new WebSocket(proto + location.host + "/ws");
    ws.onmessage = function (msg) { apply(JSON.parse(msg.data)); };
    ws.onclose = function () { setTimeout(connect, 5000); };
  }
  connect();
  document.getElementById("contact").addEventListener("submit", function (e) {
    e.preventDefault();
    var form = new FormData(e.target);
    fetch("/api/contact", {
      method: "POST",
      headers: { "content-type": "application/json" },
      body: JSON.stringify({
        email: form.get("email"),
        message: form.get("message"),
        token: form.get("cf-turnstile-response") || ""
      })
    }).then(function (r) {
      document.getElementById("contact-result").textContent =
        r.ok ? "Sent, thanks!" : "Something went wrong, please try again.";
    });
  });
})();
"#;
