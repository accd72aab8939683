//! Prompt assembly from container and item context.

use crate::models::{ContainerContext, GenerationKind, ItemContext};

use super::adapter::GenerationFailure;

/// Build the prompt for one item of the given kind.
///
/// Image prompts are built from the page description, so an item without one
/// yields a permanent failure instead of a prompt.
pub fn build_prompt(
    kind: GenerationKind,
    container: &ContainerContext,
    item: &ItemContext,
) -> Result<String, GenerationFailure> {
    match kind {
        GenerationKind::Description => Ok(description_prompt(container, item)),
        GenerationKind::Image => image_prompt(container, item),
    }
}

/// Build the prompt for a natural-language edit of the item's current image.
///
/// The adapter receives the current image as its reference; the prompt only
/// carries the instruction and the description the image was rendered from.
pub fn build_edit_prompt(
    container: &ContainerContext,
    item: &ItemContext,
    instruction: &str,
) -> Result<String, GenerationFailure> {
    if item.image_ref.is_none() {
        return Err(GenerationFailure::permanent(format!(
            "Page {} has no image to edit",
            item.page_index
        )));
    }

    let mut prompt = String::new();
    prompt.push_str("Edit the attached presentation slide image.\n\n");
    prompt.push_str(&format!("Edit instruction:\n{}\n", instruction.trim()));
    if let Some(description) = item
        .description
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        prompt.push_str(&format!("\nOriginal slide content:\n{}\n", description.trim()));
    }
    if container.template_ref.is_some() {
        prompt.push_str("Keep the visual style of the attached template image.\n");
    }
    prompt.push_str("\nChange only what the instruction asks for.");
    Ok(prompt)
}

fn description_prompt(container: &ContainerContext, item: &ItemContext) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are writing the content of one slide in a presentation.\n\n");
    prompt.push_str(&format!("Presentation idea:\n{}\n\n", container.idea_prompt.trim()));
    prompt.push_str(&format!("Full outline:\n{}\n\n", container.outline.to_text()));
    prompt.push_str(&format!(
        "Write the description for page {}: {}\n",
        item.page_index, item.outline.title
    ));
    if let Some(part) = &item.outline.part {
        prompt.push_str(&format!("This page belongs to: {part}\n"));
    }
    if !item.outline.points.is_empty() {
        prompt.push_str("Key points:\n");
        for point in &item.outline.points {
            prompt.push_str(&format!("- {point}\n"));
        }
    }
    prompt.push_str("\nReturn the page title, body text and speaker-facing notes as plain text.");
    prompt
}

fn image_prompt(
    container: &ContainerContext,
    item: &ItemContext,
) -> Result<String, GenerationFailure> {
    let description = item
        .description
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            GenerationFailure::permanent(format!(
                "Page {} has no description to illustrate",
                item.page_index
            ))
        })?;

    let mut prompt = String::new();
    prompt.push_str("Render a single 16:9 presentation slide.\n\n");
    prompt.push_str(&format!("Slide content:\n{}\n\n", description.trim()));
    prompt.push_str(&format!("Deck outline:\n{}\n\n", container.outline.to_text()));
    prompt.push_str(&format!("Current section: {}\n", item.outline.section()));
    if container.template_ref.is_some() {
        prompt.push_str("Follow the visual style of the attached template image.\n");
    }
    if let Some(requirements) = container
        .extra_requirements
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        prompt.push_str(&format!("\nAdditional requirements:\n{}\n", requirements.trim()));
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::FailureKind;
    use crate::models::{Outline, OutlineEntry, PageOutline};
    use uuid::Uuid;

    fn container() -> ContainerContext {
        ContainerContext {
            container_id: Uuid::new_v4(),
            idea_prompt: "Quarterly review".to_string(),
            outline: Outline::new(vec![
                OutlineEntry::Page(PageOutline::new("Summary", vec![])),
                OutlineEntry::Part {
                    part: "Numbers".to_string(),
                    pages: vec![PageOutline::new("Revenue", vec![])],
                },
            ]),
            extra_requirements: Some("Use the brand palette".to_string()),
            template_ref: None,
        }
    }

    fn item(description: Option<&str>) -> ItemContext {
        ItemContext {
            item_id: Uuid::new_v4(),
            position: 1,
            page_index: 2,
            outline: PageOutline {
                title: "Revenue".to_string(),
                points: vec!["up 12%".to_string()],
                part: Some("Numbers".to_string()),
            },
            description: description.map(str::to_string),
            image_ref: None,
        }
    }

    #[test]
    fn test_description_prompt_includes_page_context() {
        let prompt = build_prompt(GenerationKind::Description, &container(), &item(None)).unwrap();
        assert!(prompt.contains("Quarterly review"));
        assert!(prompt.contains("page 2: Revenue"));
        assert!(prompt.contains("This page belongs to: Numbers"));
        assert!(prompt.contains("- up 12%"));
        assert!(prompt.contains("1. Summary\n2. Numbers"));
    }

    #[test]
    fn test_image_prompt_uses_description_and_requirements() {
        let prompt = build_prompt(
            GenerationKind::Image,
            &container(),
            &item(Some("Revenue grew 12%")),
        )
        .unwrap();
        assert!(prompt.contains("Revenue grew 12%"));
        assert!(prompt.contains("Current section: Numbers"));
        assert!(prompt.contains("Use the brand palette"));
    }

    #[test]
    fn test_edit_prompt_needs_a_current_image() {
        let mut page = item(Some("Revenue grew 12%"));
        let failure = build_edit_prompt(&container(), &page, "make it blue").unwrap_err();
        assert_eq!(failure.kind, FailureKind::Permanent);

        page.image_ref = Some("mem://revenue.png".to_string());
        let prompt = build_edit_prompt(&container(), &page, "  make it blue ").unwrap();
        assert!(prompt.contains("Edit instruction:\nmake it blue\n"));
        assert!(prompt.contains("Revenue grew 12%"));
    }

    #[test]
    fn test_image_prompt_without_description_is_permanent_failure() {
        let failure = build_prompt(GenerationKind::Image, &container(), &item(None)).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Permanent);
    }
}
