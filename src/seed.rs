use crate::db::{operations, DatabaseProxy};
use crate::db::operations::catalog::NewQuestion;

struct SampleCategory {
    name: &'static str,
    description: &'static str,
    questions: &'static [(&'static str, &'static str, &'static str, i64)],
}

const SAMPLE_CATALOG: &[SampleCategory] = &[
    SampleCategory {
        name: "Verb tenses",
        description: "Simple, perfect and progressive forms",
        questions: &[
            ("She ___ to the market yesterday.", "went", "Past simple for a finished action.", 1),
            ("By noon they ___ the report.", "had finished", "Past perfect: earlier of two past events.", 3),
            ("He ___ here since 2019.", "has lived", "Present perfect for an unfinished period.", 2),
            ("This time tomorrow we ___ over the Alps.", "will be flying", "Future progressive for an action in progress.", 4),
        ],
    },
    SampleCategory {
        name: "Prepositions",
        description: "Time, place and dependent prepositions",
        questions: &[
            ("The meeting is ___ Monday.", "on", "Days of the week take 'on'.", 1),
            ("She insisted ___ paying the bill.", "on", "'insist' takes the dependent preposition 'on'.", 3),
            ("He is afraid ___ spiders.", "of", "'afraid' pairs with 'of'.", 2),
            ("The results differ ___ our forecast.", "from", "'differ from' is the standard pairing.", 4),
        ],
    },
    SampleCategory {
        name: "Articles",
        description: "Definite, indefinite and zero articles",
        questions: &[
            ("She plays ___ piano.", "the", "Instruments take the definite article.", 2),
            ("He is ___ honest man.", "an", "'honest' starts with a vowel sound.", 1),
            ("___ water boils at 100 degrees.", "(no article)", "General statements about substances take no article.", 3),
            ("It was ___ most boring film of the year.", "the", "Superlatives take the definite article.", 2),
        ],
    },
];

/// Loads a small sample catalog on an empty database so a fresh instance
/// has something to recommend. No-op when any question already exists.
pub async fn seed_sample_catalog(proxy: &DatabaseProxy) {
    let pool = proxy.pool();

    let existing = match operations::catalog::max_question_id(pool).await {
        Ok(max_id) => max_id,
        Err(err) => {
            tracing::warn!(error = %err, "failed to check catalog before seeding");
            return;
        }
    };
    if existing > 0 {
        tracing::debug!("catalog already populated, skipping sample seed");
        return;
    }

    for category in SAMPLE_CATALOG {
        let category_id =
            match operations::catalog::insert_category(pool, category.name, category.description)
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!(error = %err, category = category.name, "failed to seed category");
                    continue;
                }
            };

        let items: Vec<NewQuestion> = category
            .questions
            .iter()
            .map(|(prompt, answer, explanation, difficulty)| NewQuestion {
                category_id,
                prompt: prompt.to_string(),
                answer: answer.to_string(),
                explanation: explanation.to_string(),
                difficulty_level: *difficulty,
            })
            .collect();

        if let Err(err) = operations::catalog::insert_questions_batch(pool, &items).await {
            tracing::warn!(error = %err, category = category.name, "failed to seed questions");
        }
    }

    tracing::info!("seeded sample catalog");
}
