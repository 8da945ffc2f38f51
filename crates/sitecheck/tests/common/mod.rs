//! Shared fixtures: a miniature copy of the site on disk

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use sitecheck::HarnessConfig;
use tempfile::TempDir;

pub const HOME: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <meta name="description" content="Threat hunting and detection engineering" />
  <title>MB Secure</title>
  <link rel="stylesheet" href="assets/css/main.css" />
</head>
<body class="is-preload">
  <nav id="nav">
    <a href="#about">About</a>
    <a href="services/">Services</a>
    <a href="blog/index.html">Blog</a>
    <a href="mailto:info@mbsecure.nl">Mail</a>
    <a href="tel:+31600000000">Call</a>
    <a href="https://github.com/marcusbakker" target="_blank">GitHub</a>
  </nav>
  <section id="about"><img src="images/logo.png" alt="logo" /></section>
  <script src="assets/js/main.js"></script>
</body>
</html>
"##;

pub const BLOG_INDEX: &str = r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width" />
  <meta name="description" content="Blog" />
  <title>Blog - MB Secure</title>
</head>
<body>
  <a href="../index.html#about">About</a>
  <a href="2021/3/first-post.html">First post</a>
  <a href="page/2/index.html">Next</a>
</body>
</html>
"##;

pub const SERVICES: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <meta name="description" content="Services offered by MB Secure" />
  <title>Services - MB Secure</title>
</head>
<body>
  <nav id="nav">
    <a href="../index.html#about">About</a>
    <a href="./">Services</a>
    <a href="../blog/index.html">Blog</a>
  </nav>
  <section id="services">Threat hunting, detection engineering and training.</section>
</body>
</html>
"##;

pub const POST: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <meta name="description" content="A post about threat hunting" />
  <title>Post - MB Secure</title>
</head>
<body>
  <a href="../../../index.html">Home</a>
  <a href="../../index.html">Back to blog</a>
  <article><h1>Post</h1><pre><code>index=main sourcetype=sysmon</code></pre></article>
</body>
</html>
"##;

pub const BROKEN: &str = r##"<!DOCTYPE html>
<html>
<head><title>Broken</title></head>
<body>
  <a href="missing.html">one</a>
  <a href="missing.html#again">same target twice</a>
  <a href="gone/index.html">two</a>
  <a href="index.html">fine</a>
  <img src="images/nope.png" />
  <img src="images/logo.png" />
  <img src="https://cdn.example.com/remote.png" />
</body>
</html>
"##;

/// Write `contents` to `root/relative`, creating parent directories
pub fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Site tree with the fixed pages, two posts, assets and one broken page
pub fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(root, "index.html", HOME);
    write(root, "services/index.html", SERVICES);
    write(root, "blog/index.html", BLOG_INDEX);
    let page_2 = BLOG_INDEX
        .replace("Blog - MB", "Blog - Page 2 - MB")
        .replace("../index.html", "../../../index.html")
        .replace("2021/3/", "../../2021/3/")
        .replace("page/2/index.html", "../../index.html");
    write(root, "blog/page/2/index.html", page_2);
    write(root, "blog/2021/3/first-post.html", POST.replace("Post - ", "First post - "));
    write(root, "blog/2020/4/the-sources-for-hunts-and-how-to-prioritise.html", POST);
    write(root, "broken.html", BROKEN);

    write(root, "assets/css/main.css", "body { margin: 0; }\n".repeat(10));
    write(root, "assets/css/fontawesome-all.min.css", ".fa{}");
    write(root, "assets/js/main.js", "(function(){})();");
    write(root, "images/logo.png", [0x89u8, b'P', b'N', b'G']);
    write(root, "images/marcus.jpg", [0xffu8, 0xd8, 0xff]);

    dir
}

/// Config for `site` on an ephemeral port with no third-party resources
pub fn config(site: &Path) -> HarnessConfig {
    let mut config = HarnessConfig {
        site_root: site.to_path_buf(),
        external_resources: Vec::new(),
        ..Default::default()
    };
    config.server.port = 0;
    config
}
