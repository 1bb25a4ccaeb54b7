//! Anti-detection measures for the browser fetcher.
//!
//! Each knob in [`StealthConfig`](crate::config::StealthConfig) maps to a
//! script injected before any document in the page runs, plus a CDP user
//! agent override. Injection is best-effort: a script that fails to install
//! is logged and skipped.

use anyhow::Result;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use std::time::Duration;

use crate::config::StealthConfig;

const WEBDRIVER_JS: &str = r"
    Object.defineProperty(navigator, 'webdriver', { get: () => false });
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
";

const CHROME_RUNTIME_JS: &str = r"
    if (!window.chrome) { window.chrome = {}; }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: () => ({
                onMessage: { addListener: () => {}, removeListener: () => {} },
                postMessage: () => {}
            })
        };
    }
";

const PLUGINS_JS: &str = r"
    Object.defineProperty(navigator, 'plugins', {
        get: () => {
            const mock = [
                { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
                { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
                { name: 'Native Client', filename: 'internal-nacl-plugin' }
            ];
            const plugins = {};
            mock.forEach((p, i) => { plugins[i] = p; plugins[p.name] = p; });
            Object.defineProperty(plugins, 'length', { value: mock.length });
            return plugins;
        }
    });
";

const LANGUAGES_JS: &str = r"
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    Object.defineProperty(navigator, 'language', { get: () => 'en-US' });
";

const WEBGL_JS: &str = r"
    if (window.WebGLRenderingContext) {
        const getParameter = WebGLRenderingContext.prototype.getParameter;
        WebGLRenderingContext.prototype.getParameter = new Proxy(getParameter, {
            apply: function(target, ctx, args) {
                const param = (args && args[0]) || null;
                if (param === 37445) { return 'Intel Inc.'; }
                if (param === 37446) { return 'Intel(R) UHD Graphics'; }
                return Reflect.apply(target, ctx, args);
            }
        });
    }
";

const CANVAS_JS: &str = r"
    if (window.HTMLCanvasElement) {
        const toDataURL = HTMLCanvasElement.prototype.toDataURL;
        HTMLCanvasElement.prototype.toDataURL = function(...args) {
            const ctx = this.getContext('2d');
            if (ctx && this.width > 0 && this.height > 0) {
                const shade = ctx.getImageData(0, 0, 1, 1);
                shade.data[0] = shade.data[0] ^ 1;
                ctx.putImageData(shade, 0, 0);
            }
            return toDataURL.apply(this, args);
        };
    }
";

const VENDOR_JS: &str = r"
    Object.defineProperty(navigator, 'vendor', { get: () => 'Google Inc.' });
    Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 8 });
";

const PERMISSIONS_JS: &str = r"
    if (navigator.permissions && navigator.permissions.query) {
        const query = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = (params) =>
            params && params.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : query(params);
    }
";

/// Install the configured evasions on a fresh page.
///
/// Scripts are registered to run before any document script; the user agent
/// override is applied last, with any `Headless` marker stripped.
pub async fn apply(page: &Page, stealth: &StealthConfig, user_agent: &str) -> Result<()> {
    let mut scripts: Vec<(&str, &str)> = Vec::new();
    if stealth.hide_automation_markers {
        scripts.push(("webdriver", WEBDRIVER_JS));
        scripts.push(("chrome_runtime", CHROME_RUNTIME_JS));
        scripts.push(("vendor", VENDOR_JS));
        scripts.push(("permissions", PERMISSIONS_JS));
    }
    if stealth.spoof_plugins {
        scripts.push(("plugins", PLUGINS_JS));
    }
    if stealth.spoof_languages {
        scripts.push(("languages", LANGUAGES_JS));
    }
    if stealth.spoof_webgl {
        scripts.push(("webgl", WEBGL_JS));
    }
    if stealth.spoof_canvas {
        scripts.push(("canvas", CANVAS_JS));
    }

    for (name, source) in scripts {
        let result = page
            .execute(AddScriptToEvaluateOnNewDocumentParams {
                source: source.to_string(),
                include_command_line_api: None,
                world_name: None,
                run_immediately: None,
            })
            .await;
        if let Err(e) = result {
            log::warn!("failed to install {name} evasion: {e}");
        }
    }

    let ua = user_agent.replace("Headless", "");
    page.execute(SetUserAgentOverrideParams {
        user_agent: ua,
        accept_language: Some("en-US,en;q=0.9".to_string()),
        platform: None,
        user_agent_metadata: None,
    })
    .await?;

    if let Some(tz) = effective_timezone(stealth) {
        if let Err(e) = page
            .execute(SetTimezoneOverrideParams {
                timezone_id: tz.clone(),
            })
            .await
        {
            log::warn!("failed to override timezone to {tz}: {e}");
        }
    }

    Ok(())
}

/// The timezone to present: an explicit override wins; `match_timezone`
/// falls back to the host's `TZ` variable when set.
fn effective_timezone(stealth: &StealthConfig) -> Option<String> {
    if let Some(tz) = &stealth.timezone {
        return Some(tz.clone());
    }
    if stealth.match_timezone {
        return std::env::var("TZ").ok();
    }
    None
}

/// Pool of desktop user agents for rotation.
const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Pick the user agent for one fetch: a random pool entry when rotation is
/// on, the configured agent otherwise.
#[must_use]
pub fn pick_user_agent<'a>(stealth: &StealthConfig, configured: &'a str) -> &'a str {
    if stealth.rotate_user_agent {
        let idx = rand::random_range(0..USER_AGENT_POOL.len());
        USER_AGENT_POOL[idx]
    } else {
        configured
    }
}

/// Random desktop-ish viewport for fingerprint variance.
#[must_use]
pub fn random_viewport() -> (u32, u32) {
    let width = rand::random_range(1280..=1920);
    let height = rand::random_range(800..=1080);
    (width, height)
}

async fn dispatch_mouse(
    page: &Page,
    event_type: DispatchMouseEventType,
    x: f64,
    y: f64,
    button: Option<MouseButton>,
) -> Result<()> {
    let mut builder = DispatchMouseEventParams::builder()
        .r#type(event_type)
        .x(x)
        .y(y);
    if let Some(button) = button {
        builder = builder.button(button).click_count(1);
    }
    let params = builder
        .build()
        .map_err(|e| anyhow::anyhow!("invalid mouse event: {e}"))?;
    page.execute(params).await?;
    Ok(())
}

/// Move the pointer toward `(x, y)` along a jittered path instead of
/// teleporting it there.
pub async fn natural_mouse_move(page: &Page, x: f64, y: f64) -> Result<()> {
    let steps = rand::random_range(4..9);
    let (start_x, start_y) = (
        rand::random_range(0.0..200.0),
        rand::random_range(0.0..200.0),
    );
    for step in 1..=steps {
        let t = f64::from(step) / f64::from(steps);
        let jitter_x = rand::random_range(-3.0..3.0);
        let jitter_y = rand::random_range(-3.0..3.0);
        let px = start_x + (x - start_x) * t + jitter_x;
        let py = start_y + (y - start_y) * t + jitter_y;
        dispatch_mouse(page, DispatchMouseEventType::MouseMoved, px, py, None).await?;
        tokio::time::sleep(Duration::from_millis(rand::random_range(10..40))).await;
    }
    Ok(())
}

/// Click at `(x, y)` with a human-looking approach and press/release delay.
///
/// When `randomize_click_offsets` is on, callers should pass a point jittered
/// away from the element center.
pub async fn natural_click(page: &Page, stealth: &StealthConfig, x: f64, y: f64) -> Result<()> {
    if stealth.simulate_mouse {
        natural_mouse_move(page, x, y).await?;
    }
    dispatch_mouse(
        page,
        DispatchMouseEventType::MousePressed,
        x,
        y,
        Some(MouseButton::Left),
    )
    .await?;
    tokio::time::sleep(Duration::from_millis(rand::random_range(30..120))).await;
    dispatch_mouse(
        page,
        DispatchMouseEventType::MouseReleased,
        x,
        y,
        Some(MouseButton::Left),
    )
    .await?;
    Ok(())
}

/// Offset a click target away from the exact element center.
#[must_use]
pub fn jitter_click_point(x: f64, y: f64, stealth: &StealthConfig) -> (f64, f64) {
    if stealth.randomize_click_offsets {
        (
            x + rand::random_range(-4.0..4.0),
            y + rand::random_range(-4.0..4.0),
        )
    } else {
        (x, y)
    }
}
