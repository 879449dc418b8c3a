use super::*;

mod markers {
    use super::*;

    #[test]
    fn prompt() {
        assert_eq!("<<- web1 #\n", Markers::plain().prompt("web1"));
    }

    #[test]
    fn stdout() {
        assert_eq!(
            "# web1 ->>\nFilesystem  Size\n/dev/sda1   20G\n",
            Markers::plain().stdout("web1", b"Filesystem  Size\n/dev/sda1   20G\n"),
        );
    }

    #[test]
    fn stdout_without_trailing_newline() {
        assert_eq!(
            "# web1 ->>\npartial\n",
            Markers::plain().stdout("web1", b"partial"),
        );
    }

    #[test]
    fn stderr() {
        assert_eq!(
            "web1: ERROR ls: cannot access 'x'\n",
            Markers::plain().stderr("web1", b"ls: cannot access 'x'\r\n"),
        );
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(
            "web1: ERROR a\u{FFFD}b\n",
            Markers::plain().stderr("web1", b"a\xffb"),
        );
    }

    #[test]
    fn color_adds_escape_sequences() {
        let markers = Markers { color: true };
        for text in [
            markers.prompt("web1"),
            markers.stdout("web1", b"out"),
            markers.stderr("web1", b"err"),
        ] {
            assert!(text.contains('\u{1b}'), "{text:?}");
            assert!(text.contains("web1"), "{text:?}");
        }
        assert!(markers.stdout("web1", b"out").ends_with("\nout\n"));
    }

    #[test]
    fn markers_are_distinct() {
        let markers = Markers { color: true };
        let prompt = markers.prompt("x");
        let stdout = markers.stdout("x", b"");
        let stderr = markers.stderr("x", b"");
        assert_ne!(prompt, stdout);
        assert_ne!(stdout, stderr);
        assert_ne!(prompt, stderr);
    }
}

mod test_console {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn answers_with_last_write() {
        let console = TestConsole::new();
        console.write("<<- a #\n").unwrap();
        console.write("Password: ").unwrap();
        assert_eq!("re: Password:", console.read_line(false).unwrap());
        assert_eq!(
            vec![
                Entry::Wrote("<<- a #\n".to_string()),
                Entry::Wrote("Password: ".to_string()),
                Entry::Read {
                    echo: false,
                    answer: "re: Password:".to_string(),
                },
            ],
            console.transcript(),
        );
    }

    #[test]
    fn closed_console_fails_reads() {
        assert!(TestConsole::closed().read_line(true).is_err());
    }
}
