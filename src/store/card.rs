use std::fmt::Write;

use crate::codec::ModelMetadata;

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_owned())
}

/// Markdown README published next to a model.
pub fn model_card(
    name: &str,
    description: &str,
    sizes: &[usize],
    activation: &str,
    metadata: Option<&ModelMetadata>,
    accuracy: f64,
) -> String {
    let layers: Vec<String> = sizes.iter().map(usize::to_string).collect();
    let mut card = String::new();

    let _ = writeln!(card, "# {name}\n");
    if !description.is_empty() {
        let _ = writeln!(card, "{description}\n");
    }
    let _ = writeln!(card, "## Model Details\n");
    let _ = writeln!(card, "- **Architecture**: Feedforward Neural Network");
    let _ = writeln!(card, "- **Layer sizes**: {}", layers.join(" → "));
    let _ = writeln!(card, "- **Activation**: {activation}");
    let _ = writeln!(card, "- **Test Accuracy**: {accuracy:.2}%\n");

    let _ = writeln!(card, "## Training Details\n");
    if let Some(config) = metadata.and_then(|m| m.training_config.as_ref()) {
        let _ = writeln!(card, "- **Epochs**: {}", config.epochs);
        let _ = writeln!(card, "- **Learning Rate**: {}", config.learning_rate);
        let _ = writeln!(card, "- **Mini-batch Size**: {}", config.mini_batch_size);
        let _ = writeln!(card, "- **Seed**: {}", or_na(config.seed));
    } else {
        let _ = writeln!(card, "Not recorded.");
    }

    let _ = writeln!(card, "\n## Dataset\n");
    let _ = writeln!(
        card,
        "Trained on the MNIST handwritten digits dataset (60,000 training images, 10,000 test images).\n"
    );
    let _ = writeln!(card, "## Usage\n");
    let _ = writeln!(card, "```bash\nDEFAULT_MODEL={name} server\n```");
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::TrainingConfig;

    #[test]
    fn card_lists_architecture_and_training() {
        let meta = ModelMetadata::new(TrainingConfig::new(30, 10, 3.0), Some(95.1));
        let card = model_card("digits-v1", "Baseline", &[784, 30, 10], "sigmoid", Some(&meta), 95.123);
        assert!(card.starts_with("# digits-v1\n"));
        assert!(card.contains("784 → 30 → 10"));
        assert!(card.contains("**Test Accuracy**: 95.12%"));
        assert!(card.contains("**Epochs**: 30"));
        assert!(card.contains("**Seed**: N/A"));
    }

    #[test]
    fn card_without_metadata_says_so() {
        let card = model_card("m", "", &[2, 2], "relu", None, 50.0);
        assert!(card.contains("Not recorded."));
    }
}
