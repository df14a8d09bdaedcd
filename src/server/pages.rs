//! Embedded HTML served to browsers on the LAN.

/// Upload page template; `{{address}}` is replaced with the server's own
/// `ip:port` before serving.
const UPLOAD_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Wifidrop</title>
<style>
  body { font-family: -apple-system, system-ui, sans-serif; background: #111;
         color: #eee; margin: 0; display: flex; flex-direction: column;
         align-items: center; padding: 2rem; }
  h1 { font-weight: 600; }
  .addr { color: #888; font-size: 0.9rem; margin-bottom: 1.5rem; }
  #drop { width: min(480px, 90vw); border: 2px dashed #555; border-radius: 12px;
          padding: 3rem 1rem; text-align: center; cursor: pointer; }
  #drop.hover { border-color: #4af; background: #1a2230; }
  .row { width: min(480px, 90vw); margin-top: 0.75rem; }
  .name { font-size: 0.85rem; margin-bottom: 0.2rem; }
  progress { width: 100%; height: 6px; }
  .done { color: #6c6; }
  .fail { color: #e66; }
</style>
</head>
<body>
<h1>Drop files to import</h1>
<div class="addr">http://{{address}}</div>
<div id="drop">Drag files here or click to choose</div>
<input type="file" id="picker" multiple hidden>
<div id="rows"></div>
<script>
  const drop = document.getElementById('drop');
  const picker = document.getElementById('picker');
  const rows = document.getElementById('rows');

  drop.addEventListener('click', () => picker.click());
  picker.addEventListener('change', () => upload(picker.files));
  drop.addEventListener('dragover', e => { e.preventDefault(); drop.classList.add('hover'); });
  drop.addEventListener('dragleave', () => drop.classList.remove('hover'));
  drop.addEventListener('drop', e => {
    e.preventDefault();
    drop.classList.remove('hover');
    upload(e.dataTransfer.files);
  });

  function upload(files) {
    for (const file of files) {
      const row = document.createElement('div');
      row.className = 'row';
      row.innerHTML = '<div class="name">' + file.name + '</div><progress max="1" value="0"></progress>';
      rows.appendChild(row);
      const bar = row.querySelector('progress');

      const form = new FormData();
      form.append('file', file, file.name);

      const xhr = new XMLHttpRequest();
      xhr.open('POST', '/upload');
      xhr.setRequestHeader('X-Filename', encodeURIComponent(file.name));
      xhr.upload.onprogress = e => { if (e.lengthComputable) bar.value = e.loaded / e.total; };
      xhr.onload = () => {
        bar.value = 1;
        row.querySelector('.name').classList.add(xhr.status === 200 ? 'done' : 'fail');
      };
      xhr.onerror = () => row.querySelector('.name').classList.add('fail');
      xhr.send(form);
    }
  }
</script>
</body>
</html>
"#;

/// Render the upload page with the server's address substituted in.
pub fn upload_page(address: &str) -> String {
    UPLOAD_PAGE.replace("{{address}}", address)
}

/// Short result snippet for a successful import batch.
pub fn success_page(count: usize) -> String {
    let noun = if count == 1 { "file" } else { "files" };
    format!(
        "<html><body style=\"font-family:sans-serif\">\
         <h2 style=\"color:#2a9d2a\">Imported {count} {noun}</h2>\
         </body></html>"
    )
}

/// Short result snippet for a failed upload.
pub fn failure_page(reason: &str) -> String {
    format!(
        "<html><body style=\"font-family:sans-serif\">\
         <h2 style=\"color:#c0392b\">Upload failed</h2><p>{reason}</p>\
         </body></html>"
    )
}
