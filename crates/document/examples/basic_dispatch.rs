//! Basic dispatch example - build a small tree, listen, click, dispose

use document::{Document, DocumentConfig, Event, Listener, RegistryEvent};
use dom::Field;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut doc = Document::new(DocumentConfig::default());
    let mut notices = doc.subscribe();

    let form = doc.create_element("form")?;
    doc.append_child(doc.root(), form)?;
    let button = doc.create_element("button")?;
    doc.merge(
        button,
        [
            Field::attribute("id", "submit"),
            Field::AddClass("primary".to_string()),
        ],
    )?;
    doc.append_child(form, button)?;
    let label = doc.create_text("Send")?;
    doc.append_child(button, label)?;

    println!("{}", doc.render()?);

    doc.add_event_listener(
        form,
        "click",
        Listener::infallible(|event| {
            println!("form saw click in {:?} phase", event.phase());
        }),
        true,
    )
    .await?;
    doc.add_event_listener(
        button,
        "click",
        Listener::infallible(|event| {
            println!("button clicked, detail = {}", event.detail);
            event.prevent_default();
        }),
        false,
    )
    .await?;

    let target = doc
        .query_selector("form > button.primary")?
        .ok_or("button not found")?;
    let event = doc
        .dispatch_event(
            target,
            Event::new("click")
                .bubbles(true)
                .cancelable(true)
                .with_detail(serde_json::json!({ "x": 10, "y": 20 })),
        )
        .await?;
    println!("default prevented: {}", event.default_prevented());

    // Disposing the button purges its listeners
    doc.dispose(button)?;
    println!("button still registered: {}", doc.registry().has_entry(button).await?);

    doc.shutdown().await?;
    while let Ok(notice) = notices.try_recv() {
        if !matches!(notice, RegistryEvent::ListenerAdded { .. }) {
            println!("registry: {:?}", notice);
        }
    }

    Ok(())
}
