//! Static HTML front ends for the two upload demos.

pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Rasheed AI</title>
<style>body{font-family:sans-serif;max-width:40rem;margin:3rem auto;line-height:1.5}</style>
</head>
<body>
<h1>Rasheed AI demos</h1>
<ul>
  <li><a href="/critique">CV critique</a>: upload a PDF or TXT CV and get structured feedback.</li>
  <li><a href="/classify">Image classifier</a>: upload a photo and see the top 3 ImageNet classes.</li>
</ul>
<p>The tool-using chat agent runs in the terminal: <code>rasheed chat</code>.</p>
</body>
</html>
"#;

pub const CRITIQUE_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>CV critique</title>
<style>
body{font-family:sans-serif;max-width:48rem;margin:3rem auto;line-height:1.5}
#result{white-space:pre-wrap;border-top:1px solid #ccc;margin-top:1.5rem;padding-top:1rem}
.error{color:#b00020}
</style>
</head>
<body>
<h1>CV Critique App</h1>
<p>Upload your CV and get a feedback on its content and structure based on best practices.</p>
<form id="form">
  <p><label>Upload your CV (PDF or TXT format)
    <input type="file" name="file" accept=".pdf,.txt,application/pdf,text/plain" required></label></p>
  <p><label>Enter the job role you are applying for (optional)
    <input type="text" name="role" placeholder="e.g., Software Engineer, Data Scientist"></label></p>
  <p><button type="submit">Analyze CV</button></p>
</form>
<div id="result"></div>
<script>
const form = document.getElementById("form");
const result = document.getElementById("result");
form.addEventListener("submit", async (event) => {
  event.preventDefault();
  result.className = "";
  result.textContent = "Analyzing your CV... Please wait.";
  try {
    const response = await fetch("/api/critique", { method: "POST", body: new FormData(form) });
    const body = await response.json();
    if (!response.ok) throw new Error(body.error || response.statusText);
    result.textContent = "Feedback:\n\n" + body.feedback;
  } catch (err) {
    result.className = "error";
    result.textContent = "An error occurred while processing your CV: " + err.message;
  }
});
</script>
</body>
</html>
"#;

pub const CLASSIFY_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>AI Image Classifier</title>
<style>
body{font-family:sans-serif;max-width:48rem;margin:3rem auto;line-height:1.5}
#preview{max-width:100%;max-height:20rem;display:none}
.error{color:#b00020}
</style>
</head>
<body>
<h1>AI Image Classifier</h1>
<p>Upload an image and get predictions on what it contains.</p>
<form id="form">
  <p><label>Choose an image...
    <input type="file" name="file" accept=".jpg,.jpeg,.png,image/jpeg,image/png" required></label></p>
  <p><button type="submit">Classify Image</button></p>
</form>
<img id="preview" alt="Uploaded image">
<div id="result"></div>
<script>
const form = document.getElementById("form");
const result = document.getElementById("result");
const preview = document.getElementById("preview");
form.file.addEventListener("change", () => {
  const [file] = form.file.files;
  if (file) { preview.src = URL.createObjectURL(file); preview.style.display = "block"; }
});
form.addEventListener("submit", async (event) => {
  event.preventDefault();
  result.className = "";
  result.textContent = "Analyzing Image...";
  try {
    const response = await fetch("/api/classify", { method: "POST", body: new FormData(form) });
    const body = await response.json();
    if (!response.ok) throw new Error(body.error || response.statusText);
    const list = document.createElement("ol");
    for (const p of body.predictions) {
      const item = document.createElement("li");
      item.textContent = p.label + ": " + p.score.toFixed(2);
      list.appendChild(item);
    }
    result.textContent = "Predictions:";
    result.appendChild(list);
  } catch (err) {
    result.className = "error";
    result.textContent = "An error occurred: " + err.message;
  }
});
</script>
</body>
</html>
"#;
