use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>Scan Results</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 20px; }
    h1 { color: #333; }
    .scan { border: 1px solid #ddd; padding: 15px; margin: 10px 0; border-radius: 5px; }
    .scan h2 { margin-top: 0; }
    .vulnerability { background: #fff8e1; padding: 10px; margin: 5px 0; border-left: 3px solid #ffc107; }
    .port { background: #e3f2fd; padding: 10px; margin: 5px 0; border-left: 3px solid #2196f3; }
  </style>
</head>
<body>
  <h1>Scan Results</h1>
  <div id="scans"></div>

  <script>
    function esc(value) {
      return String(value ?? '').replace(/[&<>"']/g, c => ({
        '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'
      })[c]);
    }

    function section(title, items, empty, render) {
      const list = Array.isArray(items) ? items : [];
      const body = list.length ? list.map(render).join('') : `<p>${empty}</p>`;
      return `<h3>${title} (${list.length})</h3>${body}`;
    }

    function renderScan(scanId, scan) {
      return `
        <h2>Scan: ${esc(scanId)}</h2>
        <p><strong>Target:</strong> ${esc(scan.target || 'N/A')}</p>
        <p><strong>Timestamp:</strong> ${esc(scan.timestamp || 'N/A')}</p>
        <p><strong>Completed:</strong> ${esc(scan.summary?.scan_completed || 'N/A')}</p>
        ${section('Open Ports', scan.nmap, 'No open ports found', p => `
          <div class="port"><strong>Port ${esc(p.port)}:</strong> ${esc(p.service)} (${esc(p.version)})</div>`)}
        ${section('SQL Vulnerabilities', scan.sqlmap, 'No SQL vulnerabilities found', v => `
          <div class="vulnerability"><strong>${esc(v.vulnerability_type)}:</strong> ${esc(v.description)}
            <p>Parameter: ${esc(v.parameter)}</p></div>`)}
        ${section('Web Vulnerabilities', scan.nikto, 'No web vulnerabilities found', v => `
          <div class="vulnerability"><strong>${esc(v.osvdb_id || 'Vulnerability')}:</strong> ${esc(v.description)}
            <p>URI: ${esc(v.uri)}</p></div>`)}
      `;
    }

    async function fetchScans() {
      const scansDiv = document.getElementById('scans');
      try {
        const response = await fetch('/api/scans');
        const data = await response.json();
        const entries = Object.entries(data.scans || {});

        scansDiv.innerHTML = '';
        if (entries.length === 0) {
          scansDiv.innerHTML = '<p>No scan results available</p>';
          return;
        }
        for (const [scanId, scan] of entries) {
          const scanDiv = document.createElement('div');
          scanDiv.className = 'scan';
          scanDiv.innerHTML = renderScan(scanId, scan);
          scansDiv.appendChild(scanDiv);
        }
      } catch (error) {
        console.error('Error fetching scans:', error);
        scansDiv.innerHTML = '<p>Error loading scan results</p>';
      }
    }

    fetchScans();
    setInterval(fetchScans, 30000);
  </script>
</body>
</html>
"#;
