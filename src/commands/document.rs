use clap::Subcommand;
use docroute_core::{Document, DocumentService, NewDocument};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::OutputFormat;

#[derive(Subcommand)]
pub enum DocumentCommand {
    /// Show one document
    Get {
        /// Document type
        #[arg(value_name = "TYPE")]
        doc_type: String,

        /// Document identifier
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the documents of a type, or of the default collection
    List {
        /// Document type
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a document
    Create {
        /// Document type
        #[arg(value_name = "TYPE")]
        doc_type: String,

        /// Document identifier, unique within its type
        identifier: String,

        /// Document payload
        data: String,
    },

    /// Create every document of a JSON file, or none of them
    Import {
        /// JSON array of {"identifier", "type", "data"} objects
        file: PathBuf,
    },

    /// Replace the data of a document
    Update {
        /// Document type
        #[arg(value_name = "TYPE")]
        doc_type: String,

        /// Document identifier
        identifier: String,

        /// New payload
        #[arg(long)]
        data: Option<String>,
    },

    /// Delete one or more documents of a type
    Delete {
        /// Document type
        #[arg(value_name = "TYPE")]
        doc_type: String,

        /// Document identifiers
        #[arg(required = true)]
        identifiers: Vec<String>,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl DocumentCommand {
    pub async fn run(&self, service: &DocumentService) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            DocumentCommand::Get {
                doc_type,
                identifier,
                format,
            } => match service.get_document(identifier, doc_type).await? {
                Some(document) => {
                    match format {
                        OutputFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&document)?);
                        }
                        OutputFormat::Text => {
                            println!("{}", document);
                        }
                    }
                    Ok(())
                }
                None => Err(format!("Document not found: {} ({})", identifier, doc_type).into()),
            },

            DocumentCommand::List { doc_type, format } => {
                let documents = service.list_documents(doc_type.as_deref()).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&documents)?);
                    }
                    OutputFormat::Text => {
                        if documents.is_empty() {
                            println!("No documents found");
                            return Ok(());
                        }
                        print_table(&documents);
                    }
                }
                Ok(())
            }

            DocumentCommand::Create {
                doc_type,
                identifier,
                data,
            } => {
                if identifier.trim().is_empty() {
                    return Err("Document identifier cannot be empty".into());
                }

                let created = service
                    .create_document(NewDocument::new(identifier, doc_type, data))
                    .await?;
                println!("Created document:");
                println!("{}", created);
                Ok(())
            }

            DocumentCommand::Import { file } => {
                let items = read_import_file(file)?;
                if items.is_empty() {
                    println!("Nothing to import");
                    return Ok(());
                }

                let created = service.create_documents(items).await?;
                println!("Imported {} document(s)", created.len());
                Ok(())
            }

            DocumentCommand::Update {
                doc_type,
                identifier,
                data,
            } => {
                if data.is_none() {
                    return Err("Nothing to update. Provide --data.".into());
                }

                match service
                    .update_document(identifier, doc_type, data.clone())
                    .await?
                {
                    Some(updated) => {
                        println!("Updated document:");
                        println!("{}", updated);
                        Ok(())
                    }
                    None => Err(format!("Document not found: {} ({})", identifier, doc_type).into()),
                }
            }

            DocumentCommand::Delete {
                doc_type,
                identifiers,
                force,
            } => {
                // Confirm deletion unless --force is used
                if !force {
                    print!(
                        "Delete {} document(s) of type '{}'? [y/N] ",
                        identifiers.len(),
                        doc_type
                    );
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                let removed = delete(service, doc_type, identifiers).await?;
                println!("Deleted {} document(s)", removed);
                Ok(())
            }
        }
    }
}

/// One identifier goes through the single delete, several through one bulk delete.
async fn delete(
    service: &DocumentService,
    doc_type: &str,
    identifiers: &[String],
) -> Result<u64, Box<dyn std::error::Error>> {
    match identifiers {
        [identifier] => Ok(u64::from(
            service.delete_document(identifier, doc_type).await?,
        )),
        _ => Ok(service.delete_documents(doc_type, identifiers).await?),
    }
}

fn read_import_file(path: &Path) -> Result<Vec<NewDocument>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let items: Vec<NewDocument> = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    Ok(items)
}

fn print_table(documents: &[Document]) {
    println!("{:<32}  {:<24}  {:<16}  DATA", "ID", "IDENTIFIER", "TYPE");
    println!("{}", "-".repeat(96));
    for document in documents {
        println!(
            "{:<32}  {:<24}  {:<16}  {}",
            document.id,
            truncate(&document.identifier, 24),
            truncate(&document.doc_type, 16),
            truncate(&document.data, 40)
        );
    }
    println!("\nTotal: {} document(s)", documents.len());
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let kept: String = value.chars().take(width - 3).collect();
        format!("{}...", kept)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docroute_core::MemoryStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn service() -> DocumentService {
        DocumentService::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_read_import_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("batch.json");
        std::fs::write(
            &path,
            r#"[{"identifier": "a", "type": "Note", "data": "1"},
                {"identifier": "b", "type": "Task", "data": "2", "id": "ignored"}]"#,
        )
        .unwrap();

        let items = read_import_file(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], NewDocument::new("b", "Task", "2"));
    }

    #[test]
    fn test_read_import_file_reports_path() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let err = read_import_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn test_import_is_all_or_nothing() {
        let service = service();
        service
            .create_document(NewDocument::new("b", "Note", "old"))
            .await
            .unwrap();

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("batch.json");
        std::fs::write(
            &path,
            r#"[{"identifier": "a", "type": "Note", "data": "1"},
                {"identifier": "b", "type": "Note", "data": "2"}]"#,
        )
        .unwrap();

        let command = DocumentCommand::Import { file: path };
        let err = command.run(&service).await.unwrap_err();
        assert!(err.to_string().contains("already exist"));
        assert_eq!(service.list_documents(Some("Note")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_single_and_many() {
        let service = service();
        for id in ["a", "b", "c"] {
            service
                .create_document(NewDocument::new(id, "Note", "x"))
                .await
                .unwrap();
        }

        assert_eq!(delete(&service, "Note", &["a".into()]).await.unwrap(), 1);
        assert_eq!(delete(&service, "Note", &["a".into()]).await.unwrap(), 0);
        assert_eq!(
            delete(&service, "Note", &["b".into(), "c".into(), "zzz".into()])
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_update_without_data_is_rejected() {
        let service = service();
        let command = DocumentCommand::Update {
            doc_type: "Note".into(),
            identifier: "a".into(),
            data: None,
        };
        assert!(command.run(&service).await.is_err());
    }
}
