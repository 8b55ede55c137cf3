//! Full conversations against a scripted LLM.

use chargen_core::testing::{text_and_tools, text_response, tool_response};
use chargen_core::tools::{COMPLETE_TOOL, INSPECT_TOOL, UPDATE_TOOL};
use chargen_core::{
    Ability, CharacterSheet, CreationDriver, CreationError, DriverConfig, Rulebook, ScriptedLlm,
    SheetField, Topic, Turn,
};
use serde_json::json;

fn driver_at(topic: Topic, responses: Vec<claude::Response>) -> CreationDriver<ScriptedLlm> {
    CreationDriver::new(
        ScriptedLlm::new(responses),
        Rulebook::default(),
        DriverConfig::default().with_starting_topic(topic),
    )
    .expect("default rulebook contains every topic")
}

#[tokio::test]
async fn race_sentinel_moves_to_class() {
    let mut driver = driver_at(
        Topic::Race,
        vec![
            text_response("change_node"),
            text_response("Your race is logged. Next up: class."),
            text_response("Let's pick a class. Fighters are sturdy..."),
        ],
    );

    let turn = driver.submit("Mountain dwarf, I'm sure").await.unwrap();

    assert_eq!(driver.current_topic(), Topic::Class);
    assert_eq!(driver.current_topic().id(), "class_");
    match turn {
        Turn::Advanced {
            from,
            to,
            announcement,
            intro,
            ..
        } => {
            assert_eq!(from, Topic::Race);
            assert_eq!(to, Topic::Class);
            assert_eq!(announcement.as_deref(), Some("Your race is logged. Next up: class."));
            assert_eq!(intro, "Let's pick a class. Fighters are sturdy...");
        }
        other => panic!("expected a transition, got {other:?}"),
    }

    // submit, announcement, entry for class_
    let requests = driver.client().requests();
    assert_eq!(requests.len(), 3);
    let entry = &requests[2];
    assert!(entry.system.as_ref().unwrap().contains("choose their class."));
    let opening = entry.messages.last().unwrap().text();
    assert!(opening.starts_with("first_run==false"));
}

#[tokio::test]
async fn every_topic_with_a_successor_advances_to_it() {
    let book = Rulebook::default();
    for topic in Topic::all() {
        let Some(next) = book.graph().next(topic) else {
            continue;
        };

        let mut driver = driver_at(
            topic,
            vec![
                text_response("change_node"),
                text_response("Logged."),
                text_response("Intro"),
            ],
        );
        let turn = driver.submit("done").await.unwrap();

        assert_eq!(driver.current_topic(), next, "from {topic}");
        assert!(matches!(turn, Turn::Advanced { to, .. } if to == next));
        let last = driver.client().requests().pop().unwrap();
        assert!(last
            .system
            .unwrap()
            .contains(&format!("choose their {}.", next.label())));
    }
}

#[tokio::test]
async fn terminal_topic_completes_without_further_calls() {
    let mut driver = driver_at(Topic::SkillProficiencies, vec![text_response("change_node")]);

    let turn = driver.submit("Those two skills, please").await.unwrap();

    assert_eq!(
        turn,
        Turn::Complete {
            updated: vec![],
            message: "All done!".into(),
        }
    );
    assert_eq!(turn.display_text(), "All done!");
    assert_eq!(driver.client().request_count(), 1);
    assert_eq!(driver.current_topic(), Topic::SkillProficiencies);
    assert!(driver.is_finished());

    let err = driver.submit("anything else?").await.unwrap_err();
    assert!(matches!(err, CreationError::Finished));
    assert_eq!(driver.client().request_count(), 1);
}

#[tokio::test]
async fn ordinary_text_is_returned_unchanged() {
    let reply = "Elves have darkvision and keen senses. Want to hear about subraces?";
    let mut driver = driver_at(Topic::Race, vec![text_response(reply)]);

    let turn = driver.submit("Tell me about elves").await.unwrap();

    assert_eq!(turn, Turn::Reply(reply.to_string()));
    assert_eq!(driver.current_topic(), Topic::Race);
    assert_eq!(driver.sheet(), &CharacterSheet::new());
}

#[tokio::test]
async fn sheet_unchanged_without_update_tool() {
    let mut driver = driver_at(
        Topic::Class,
        vec![
            text_and_tools("Checking your sheet.", vec![(INSPECT_TOOL, json!({}))]),
            text_response("You're a halfling; rogues suit you."),
            text_response("Wizards study arcane magic."),
        ],
    );
    let before = driver.sheet().clone();

    driver.submit("What fits me?").await.unwrap();
    driver.submit("And wizards?").await.unwrap();

    assert_eq!(driver.sheet(), &before);
}

#[tokio::test]
async fn complete_topic_tool_advances_and_reports_updates() {
    let mut driver = CreationDriver::new(
        ScriptedLlm::new(vec![
            tool_response(vec![(
                UPDATE_TOOL,
                json!({"ability_scores": {"str": 15, "dex": 14, "con": 13, "int": 8, "wis": 12, "cha": 10}}),
            )]),
            text_and_tools("Scores saved.", vec![(COMPLETE_TOOL, json!({}))]),
            text_response("Now let's find a background."),
        ]),
        Rulebook::default(),
        DriverConfig::default()
            .with_starting_topic(Topic::AbilityScores)
            .with_announce_transitions(false),
    )
    .unwrap();

    let turn = driver.submit("Yes, go ahead and save them").await.unwrap();

    assert_eq!(
        turn,
        Turn::Advanced {
            from: Topic::AbilityScores,
            to: Topic::Background,
            updated: vec![SheetField::AbilityScores],
            announcement: None,
            intro: "Now let's find a background.".into(),
        }
    );
    assert_eq!(driver.sheet().score(Ability::Strength), Some(15));
    assert_eq!(driver.sheet().score(Ability::Intelligence), Some(8));
    assert_eq!(driver.client().request_count(), 3);
}

#[tokio::test]
async fn bad_tool_input_is_reported_to_the_assistant() {
    let mut driver = driver_at(
        Topic::AbilityScores,
        vec![
            tool_response(vec![(UPDATE_TOOL, json!({"ability_scores": {"luck": 18}}))]),
            text_response("Sorry, luck isn't an ability score."),
        ],
    );

    let turn = driver.submit("Put 18 in luck").await.unwrap();

    assert_eq!(turn, Turn::Reply("Sorry, luck isn't an ability score.".into()));
    assert!(driver.sheet().ability_scores.is_empty());

    let followup = &driver.client().requests()[1];
    match &followup.messages.last().unwrap().content[0] {
        claude::ContentBlock::ToolResult {
            is_error, content, ..
        } => {
            assert!(*is_error);
            assert!(content.contains("luck"));
        }
        other => panic!("expected a tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn full_walkthrough_builds_a_sheet() {
    let responses = vec![
        // start: race intro
        text_response("Hi, I'm your AI Dungeon Master. First, pick a race."),
        // race
        tool_response(vec![(UPDATE_TOOL, json!({"race": "Hill Dwarf"}))]),
        text_response("change_node"),
        text_response("Hill Dwarf logged. Next: class."),
        text_response("Which class calls to you?"),
        // class_
        tool_response(vec![(UPDATE_TOOL, json!({"class": "Cleric"})), (COMPLETE_TOOL, json!({}))]),
        text_response("Cleric logged. Next: ability scores."),
        text_response("Standard array, point buy, or roll?"),
        // ability_scores
        tool_response(vec![(
            UPDATE_TOOL,
            json!({"ability_scores": {"str": 14, "dex": 8, "con": 15, "int": 10, "wis": 15, "cha": 12}}),
        )]),
        text_response("change_node"),
        text_response("Scores logged. Next: background."),
        text_response("Pick a background."),
        // background
        tool_response(vec![(UPDATE_TOOL, json!({"background": "Acolyte"})), (COMPLETE_TOOL, json!({}))]),
        text_response("Acolyte logged. Next: skills."),
        text_response("Choose two cleric skills."),
        // skill_proficiencies
        tool_response(vec![
            (UPDATE_TOOL, json!({"skill_proficiencies": ["Medicine", "History"]})),
            (COMPLETE_TOOL, json!({})),
        ]),
    ];
    let mut driver = CreationDriver::new(
        ScriptedLlm::new(responses),
        Rulebook::default(),
        DriverConfig::default(),
    )
    .unwrap();

    let intro = driver.start().await.unwrap();
    assert!(intro.contains("AI Dungeon Master"));
    assert!(driver.is_first_run());

    let inputs = [
        "Hill dwarf, final answer",
        "Cleric",
        "Standard array, optimized please",
        "Acolyte",
        "Medicine and History",
    ];
    let mut last = None;
    for input in inputs {
        last = Some(driver.submit(input).await.unwrap());
    }

    assert!(last.unwrap().is_complete());
    assert!(driver.is_finished());

    let sheet = driver.sheet();
    assert_eq!(sheet.race.as_deref(), Some("Hill Dwarf"));
    assert_eq!(sheet.class.as_deref(), Some("Cleric"));
    assert_eq!(sheet.background.as_deref(), Some("Acolyte"));
    assert_eq!(sheet.score(Ability::Wisdom), Some(15));
    assert!(sheet.skill_proficiencies.contains("Medicine"));
    assert!(sheet.is_complete());

    let usage = driver.usage();
    assert_eq!(usage.requests, 16);
    assert_eq!(usage.prompt_tokens, 160);
    assert_eq!(driver.client().remaining(), 0);
}

#[tokio::test]
async fn history_carries_across_topics() {
    let mut driver = CreationDriver::new(
        ScriptedLlm::new(vec![
            text_response("Welcome! Pick a race."),
            text_response("change_node"),
            text_response("Pick a class."),
        ]),
        Rulebook::default(),
        DriverConfig::default().with_announce_transitions(false),
    )
    .unwrap();

    driver.start().await.unwrap();
    driver.submit("Gnome").await.unwrap();

    let entry = driver.client().requests().pop().unwrap();
    let texts: Vec<String> = entry.messages.iter().map(|m| m.text()).collect();
    assert_eq!(texts[1], "Welcome! Pick a race.");
    assert_eq!(texts[2], "Gnome");
    assert_eq!(texts[3], "change_node");
    assert!(texts[4].starts_with("first_run==false"));
}

#[tokio::test]
async fn sentinel_after_a_tool_round_advances() {
    let mut driver = driver_at(
        Topic::Race,
        vec![
            text_and_tools("Recording your race.", vec![(UPDATE_TOOL, json!({"race": "Elf"}))]),
            text_response("change_node"),
            text_response("Elf logged. Next: class."),
            text_response("Which class suits your elf?"),
        ],
    );

    let turn = driver.submit("Elf").await.unwrap();

    assert_eq!(driver.current_topic(), Topic::Class);
    assert_eq!(driver.sheet().race.as_deref(), Some("Elf"));
    match turn {
        Turn::Advanced { updated, intro, .. } => {
            assert_eq!(updated, vec![SheetField::Race]);
            assert_eq!(intro, "Which class suits your elf?");
        }
        other => panic!("expected a transition, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_announcement_is_retried_on_next_submit() {
    let llm = ScriptedLlm::new(vec![text_response("change_node")]);
    llm.queue_error(claude::Error::Network("connection reset".into()));
    llm.queue(text_response("Race logged. Next: class."));
    llm.queue(text_response("Pick a class."));
    let mut driver =
        CreationDriver::new(llm, Rulebook::default(), DriverConfig::default()).unwrap();

    let err = driver.submit("Elf").await.unwrap_err();
    assert!(matches!(err, CreationError::Api(claude::Error::Network(_))));
    assert!(driver.has_pending_transition());
    assert_eq!(driver.current_topic(), Topic::Race);

    // the failed announcement prompt is not left in history
    let last = driver.history().messages().last().unwrap();
    assert_eq!(last.role, claude::Role::Assistant);
    assert_eq!(last.content, "change_node");

    let turn = driver.submit("ok?").await.unwrap();
    assert_eq!(
        turn,
        Turn::Advanced {
            from: Topic::Race,
            to: Topic::Class,
            updated: vec![],
            announcement: Some("Race logged. Next: class.".into()),
            intro: "Pick a class.".into(),
        }
    );
    assert_eq!(driver.current_topic(), Topic::Class);
    assert!(!driver.has_pending_transition());
    assert!(driver
        .client()
        .requests()
        .iter()
        .all(|r| r.messages.iter().all(|m| m.text() != "ok?")));
}

#[tokio::test]
async fn failed_entry_keeps_updates_and_retries() {
    let llm = ScriptedLlm::new(vec![
        tool_response(vec![(UPDATE_TOOL, json!({"class": "Paladin"})), (COMPLETE_TOOL, json!({}))]),
        text_response("Paladin logged. Next: ability scores."),
    ]);
    llm.queue_error(claude::Error::Api {
        status: 529,
        message: "overloaded".into(),
    });
    llm.queue(text_response("How would you like to generate scores?"));
    let mut driver = CreationDriver::new(
        llm,
        Rulebook::default(),
        DriverConfig::default().with_starting_topic(Topic::Class),
    )
    .unwrap();

    assert!(driver.submit("Paladin").await.is_err());
    assert!(driver.has_pending_transition());
    assert_eq!(driver.current_topic(), Topic::Class);
    assert_eq!(driver.sheet().class.as_deref(), Some("Paladin"));

    let turn = driver.submit("retry").await.unwrap();
    assert_eq!(
        turn,
        Turn::Advanced {
            from: Topic::Class,
            to: Topic::AbilityScores,
            updated: vec![SheetField::Class],
            announcement: Some("Paladin logged. Next: ability scores.".into()),
            intro: "How would you like to generate scores?".into(),
        }
    );
    assert_eq!(driver.current_topic(), Topic::AbilityScores);
    // submit, announcement, failed entry, retried entry
    assert_eq!(driver.client().request_count(), 4);
}
